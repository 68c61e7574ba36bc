//! Wire messages of the live API
//!
//! Only the fields the session reads are modelled; everything else the server
//! sends is ignored by serde.

use crate::session::config::LiveConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound server message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// User speech transcription fragment
    pub fn input_text(&self) -> Option<&str> {
        self.server_content
            .as_ref()?
            .input_transcription
            .as_ref()
            .map(|t| t.text.as_str())
    }

    /// Model speech transcription fragment
    pub fn output_text(&self) -> Option<&str> {
        self.server_content
            .as_ref()?
            .output_transcription
            .as_ref()
            .map(|t| t.text.as_str())
    }

    /// Base64 audio of the first model part, if any
    pub fn audio_data(&self) -> Option<&str> {
        self.server_content
            .as_ref()?
            .model_turn
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()
            .map(|d| d.data.as_str())
    }

    pub fn turn_complete(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.turn_complete)
    }

    pub fn interrupted(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.interrupted)
    }
}

/// Base64 media payload with its MIME type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub data: String,
    pub mime_type: String,
}

/// Outbound realtime input: `{ media: { data, mimeType } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeInput {
    pub media: MediaChunk,
}

impl RealtimeInput {
    pub fn media(chunk: MediaChunk) -> Self {
        Self { media: chunk }
    }
}

/// Client frames as the websocket endpoint expects them
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<WireRealtimeInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: Value,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

impl ClientMessage {
    pub fn setup(config: &LiveConfig) -> Self {
        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        let system_instruction = config.system_instruction.as_ref().map(|text| Content {
            parts: vec![Part {
                text: Some(text.clone()),
                inline_data: None,
            }],
        });

        Self {
            setup: Some(Setup {
                model,
                generation_config: GenerationConfig {
                    response_modalities: vec![config.response_modality.as_str().to_string()],
                    speech_config: serde_json::json!({
                        "voiceConfig": {
                            "prebuiltVoiceConfig": { "voiceName": config.voice }
                        }
                    }),
                },
                system_instruction,
                input_audio_transcription: config
                    .input_transcription
                    .then(|| serde_json::json!({})),
                output_audio_transcription: config
                    .output_transcription
                    .then(|| serde_json::json!({})),
            }),
            realtime_input: None,
        }
    }

    pub fn realtime_input(input: RealtimeInput) -> Self {
        Self {
            setup: None,
            realtime_input: Some(WireRealtimeInput {
                media_chunks: vec![input.media],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_audio_message() {
        let raw = json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } }]
                }
            }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.audio_data(), Some("AAA="));
        assert!(!msg.turn_complete());
        assert!(!msg.interrupted());
    }

    #[test]
    fn test_parse_transcriptions_and_flags() {
        let raw = json!({
            "serverContent": {
                "inputTranscription": { "text": "hel" },
                "outputTranscription": { "text": "Hi" },
                "turnComplete": true,
                "interrupted": true,
                "generationComplete": true
            }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.input_text(), Some("hel"));
        assert_eq!(msg.output_text(), Some("Hi"));
        assert!(msg.turn_complete());
        assert!(msg.interrupted());
        assert_eq!(msg.audio_data(), None);
    }

    #[test]
    fn test_setup_complete() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.server_content.is_none());
    }

    #[test]
    fn test_outbound_media_shape() {
        let input = RealtimeInput::media(MediaChunk {
            data: "AAA=".into(),
            mime_type: "audio/pcm;rate=16000".into(),
        });
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({ "media": { "data": "AAA=", "mimeType": "audio/pcm;rate=16000" } })
        );

        let wire = serde_json::to_value(ClientMessage::realtime_input(input)).unwrap();
        assert_eq!(
            wire,
            json!({ "realtimeInput": { "mediaChunks": [{ "data": "AAA=", "mimeType": "audio/pcm;rate=16000" }] } })
        );
    }

    #[test]
    fn test_setup_message() {
        let config = LiveConfig::default();
        let wire = serde_json::to_value(ClientMessage::setup(&config)).unwrap();
        let setup = &wire["setup"];

        assert_eq!(setup["model"], format!("models/{}", config.model));
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(setup["inputAudioTranscription"], json!({}));
        assert_eq!(setup["outputAudioTranscription"], json!({}));
        assert!(setup["systemInstruction"]["parts"][0]["text"].is_string());
        assert!(wire.get("realtimeInput").is_none());
    }

    #[test]
    fn test_setup_without_transcription() {
        let config = LiveConfig::default()
            .with_model("models/custom")
            .with_transcription(false, false);
        let wire = serde_json::to_value(ClientMessage::setup(&config)).unwrap();
        assert_eq!(wire["setup"]["model"], "models/custom");
        assert!(wire["setup"].get("inputAudioTranscription").is_none());
        assert!(wire["setup"].get("outputAudioTranscription").is_none());
    }
}
