//! Speech synthesizer client.
//!
//! [`SpeechSynthesizer`] is the seam between reconciliation and the speech
//! service. [`VoicevoxClient`] talks to a VOICEVOX engine over HTTP using
//! its two-step protocol: `POST /audio_query` builds a synthesis query for
//! the text and voice, the query's `speedScale` is overridden, and
//! `POST /synthesis` turns it into WAV bytes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scenecast_common::{ScenecastError, ScenecastResult};

/// Failure of one synthesis request.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("request to {stage} failed: {source}")]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },

    #[error("{stage} returned HTTP {status}: {body}")]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected {stage} response: {message}")]
    Response {
        stage: &'static str,
        message: String,
    },
}

/// Converts text to a waveform.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id` at `speed_scale`, returning WAV
    /// bytes. The duration of the result is whatever the service produced.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: u32,
        speed_scale: f64,
    ) -> Result<Vec<u8>, SynthesisError>;

    /// Human-readable service name for logs.
    fn name(&self) -> &str;
}

/// VOICEVOX engine client.
#[derive(Debug, Clone)]
pub struct VoicevoxClient {
    base_url: String,
    client: Client,
}

impl VoicevoxClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> ScenecastResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ScenecastError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Engine version, used to check that the service is reachable.
    pub async fn version(&self) -> Result<String, SynthesisError> {
        const STAGE: &str = "version";
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })?;
        let response = check_status(STAGE, response).await?;
        let version: String = response
            .json()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })?;
        Ok(version)
    }

    async fn audio_query(
        &self,
        text: &str,
        voice_id: u32,
    ) -> Result<serde_json::Value, SynthesisError> {
        const STAGE: &str = "audio_query";
        let speaker = voice_id.to_string();
        let response = self
            .client
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })?;
        let response = check_status(STAGE, response).await?;
        response
            .json()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: u32,
        speed_scale: f64,
    ) -> Result<Vec<u8>, SynthesisError> {
        const STAGE: &str = "synthesis";
        let mut query = self.audio_query(text, voice_id).await?;
        let Some(fields) = query.as_object_mut() else {
            return Err(SynthesisError::Response {
                stage: "audio_query",
                message: "query is not a JSON object".to_string(),
            });
        };
        fields.insert("speedScale".to_string(), serde_json::json!(speed_scale));

        let speaker = voice_id.to_string();
        let response = self
            .client
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", speaker.as_str())])
            .json(&query)
            .send()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })?;
        let response = check_status(STAGE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| SynthesisError::Transport { stage: STAGE, source })?;
        if bytes.is_empty() {
            return Err(SynthesisError::Response {
                stage: STAGE,
                message: "empty body".to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "voicevox"
    }
}

async fn check_status(
    stage: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SynthesisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SynthesisError::Status {
        stage,
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = VoicevoxClient::new("http://127.0.0.1:50021/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:50021");
        assert_eq!(client.name(), "voicevox");
    }

    #[test]
    fn test_status_error_message() {
        let err = SynthesisError::Status {
            stage: "audio_query",
            status: 422,
            body: "invalid speaker".into(),
        };
        assert_eq!(err.to_string(), "audio_query returned HTTP 422: invalid speaker");
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_a_transport_error() {
        // Port 9 (discard) is closed on test machines.
        let client = VoicevoxClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.synthesize("hello", 1, 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Transport {
                stage: "audio_query",
                ..
            }
        ));
    }
}
