use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use homestash_core::config::NlpConfig;
use homestash_core::tags::{Lemmatizer, LemmatizerError, Token};

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

/// Client for the lemmatizer/POS sidecar: POST `/analyze` with `{"text"}`,
/// a JSON array of `{lemma, pos, is_stop}` tokens back.
pub struct HttpLemmatizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLemmatizer {
    pub fn new(config: &NlpConfig) -> Result<Self, LemmatizerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| LemmatizerError::Transport(err.to_string()))?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }
}

#[async_trait]
impl Lemmatizer for HttpLemmatizer {
    async fn analyze(&self, text: &str) -> Result<Vec<Token>, LemmatizerError> {
        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(&AnalyzeRequest { text })
            .send()
            .await
            .map_err(|err| LemmatizerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LemmatizerError::InvalidResponse(format!("status {status}")));
        }

        response
            .json::<Vec<Token>>()
            .await
            .map_err(|err| LemmatizerError::InvalidResponse(err.to_string()))
    }
}
