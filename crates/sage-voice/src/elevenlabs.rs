//! ElevenLabs REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use sage_core::config::VoiceConfig;
use sage_core::types::VoiceDescriptor;

use crate::api::VoiceApi;
use crate::error::VoiceError;
use crate::format::AudioFormat;

const XI_API_KEY_HEADER: &str = "xi-api-key";

#[derive(Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceEntry>,
}

#[derive(Deserialize)]
struct VoiceEntry {
    voice_id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Clone)]
pub struct ElevenLabsApi {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    tts_model: String,
    transcription_model: String,
}

impl ElevenLabsApi {
    pub fn new(config: &VoiceConfig, api_key: impl Into<String>) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tts_model: config.tts_model.clone(),
            transcription_model: config.transcription_model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Text-to-speech endpoint for `voice_id`, which becomes exactly one path segment.
    fn speech_url(&self, voice_id: &str) -> Result<Url, VoiceError> {
        if !is_valid_voice_id(voice_id) {
            return Err(VoiceError::Synthesis(format!("invalid voice id {:?}", voice_id)));
        }
        let mut url = Url::parse(&self.url("/v1/text-to-speech"))
            .map_err(|e| VoiceError::Api(format!("invalid API base {}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| VoiceError::Api(format!("API base {} cannot take a path", self.api_base)))?
            .push(voice_id);
        Ok(url)
    }
}

/// Voice ids are opaque tokens of ASCII letters, digits, `-` and `_`.
fn is_valid_voice_id(voice_id: &str) -> bool {
    !voice_id.is_empty()
        && voice_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Turn a non-success response into an API error with the remote detail.
async fn error_for_response(resp: Response) -> VoiceError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            let detail = v.get("detail")?;
            detail
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    VoiceError::Api(format!("{}: {}", status.as_u16(), detail.trim()))
}

fn transport_error(err: reqwest::Error) -> VoiceError {
    VoiceError::Api(format!("request failed: {}", err))
}

#[async_trait]
impl VoiceApi for ElevenLabsApi {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn transcribe(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String, VoiceError> {
        let size = audio.len();
        let part = Part::bytes(audio)
            .file_name(format!("audio.{}", format.extension()))
            .mime_str(format.mime_type())
            .map_err(transport_error)?;
        let form = Form::new()
            .text("model_id", self.transcription_model.clone())
            .part("file", part);

        debug!(bytes = size, format = %format, "Sending speech-to-text request");

        let resp = self
            .http
            .post(self.url("/v1/speech-to-text"))
            .header(XI_API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }

        let parsed: TranscriptResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Api(format!("malformed transcript response: {}", e)))?;
        Ok(parsed.text)
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        let body = SpeechBody {
            text,
            model_id: &self.tts_model,
        };

        let url = self.speech_url(voice_id)?;

        debug!(voice_id, chars = text.len(), "Sending text-to-speech request");

        let resp = self
            .http
            .post(url)
            .header(XI_API_KEY_HEADER, &self.api_key)
            .header(header::ACCEPT, AudioFormat::Mp3.mime_type())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }

        let bytes = resp.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, VoiceError> {
        let resp = self
            .http
            .get(self.url("/v1/voices"))
            .header(XI_API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }

        let parsed: VoicesResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Api(format!("malformed voices response: {}", e)))?;

        Ok(parsed
            .voices
            .into_iter()
            .map(|v| VoiceDescriptor {
                id: v.voice_id,
                name: v.name,
                category: v.category.unwrap_or_default(),
            })
            .collect())
    }
}
