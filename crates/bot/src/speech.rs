use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use homestash_core::config::SpeechConfig;

/// Rendered audio held in memory for the current turn only. Delivered to the
/// transport and then dropped; never written to the catalog or media store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceClip {
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech transport failed: {0}")]
    Transport(String),
    #[error("speech service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Text-to-speech renderer. The search flow attaches a spoken rendition of
/// each match; when no synthesizer is configured the matches go out without
/// audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<VoiceClip, SpeechError>;
}

/// Spoken line announced for one search match.
pub fn location_announcement(location: &str, description: &str) -> String {
    format!("Вещь находится в {location}. {description}")
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Client for an HTTP text-to-speech sidecar: POST `/synthesize` with
/// `{"text", "language"}`, audio bytes back.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(base_url: &str, config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SpeechError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<VoiceClip, SpeechError> {
        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&SynthesizeRequest { text, language: &self.language })
            .send()
            .await
            .map_err(|err| SpeechError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::InvalidResponse(format!("status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| SpeechError::Transport(err.to_string()))?;
        if bytes.is_empty() {
            return Err(SpeechError::InvalidResponse("empty audio payload".to_owned()));
        }

        Ok(VoiceClip { bytes: bytes.to_vec() })
    }
}
