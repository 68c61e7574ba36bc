use anyhow::{Context, Result};
use std::sync::Arc;
use studio_live::audio::{MicrophoneCapture, SpeakerOutput};
use studio_live::{GenAiClient, LiveAudioSession, LiveConfig, SessionCommand, SessionUpdate};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_live=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Studio Live");

    let config = match std::env::args().nth(1) {
        Some(path) => LiveConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => LiveConfig::default(),
    };
    let client = GenAiClient::from_env().context("Missing API credential")?;

    let (session, mut handle) = LiveAudioSession::new(
        config,
        Arc::new(client),
        Box::new(MicrophoneCapture::new()),
        Box::new(SpeakerOutput::new()),
    );
    let session_task = tokio::spawn(session.run());

    handle.send_command(SessionCommand::Start)?;
    println!("Listening. Press Ctrl+C to stop.");

    let mut was_live = false;
    loop {
        tokio::select! {
            update = handle.recv_update() => match update {
                Some(SessionUpdate::StateChanged(state)) => {
                    info!("Session {}", state);
                    if state.is_live() {
                        was_live = true;
                    } else if state.is_idle() && was_live {
                        // Remote side ended the conversation
                        break;
                    }
                }
                Some(SessionUpdate::TurnCompleted(turn)) => {
                    if turn.has_user() {
                        println!("you:   {}", turn.user);
                    }
                    if turn.has_model() {
                        println!("model: {}", turn.model);
                    }
                }
                Some(SessionUpdate::Interrupted) => info!("Model interrupted"),
                Some(SessionUpdate::Error(message)) => {
                    error!("{}", message);
                    break;
                }
                Some(SessionUpdate::Shutdown) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
        }
    }

    if let Err(e) = handle.send_command(SessionCommand::Shutdown) {
        warn!("{}", e);
    }
    session_task.await.context("Session task failed")?;

    println!("{} turn(s) recorded", handle.transcript().len());
    Ok(())
}
