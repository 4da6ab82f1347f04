//! Client for the backend speech synthesis API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;

/// Emotion used when the caller does not supply one.
pub const DEFAULT_EMOTION: &str = "neutral";

/// Voice used when the caller does not supply one.
pub const DEFAULT_VOICE: &str = "Tomoko";

/// Body forwarded to `{base}/tts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub emotion: String,
    pub voice: String,
}

impl SynthesisRequest {
    /// Creates a request, filling in the default emotion and voice.
    #[must_use]
    pub fn new(text: impl Into<String>, emotion: Option<String>, voice: Option<String>) -> Self {
        Self {
            text: text.into(),
            emotion: emotion.unwrap_or_else(|| DEFAULT_EMOTION.to_string()),
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct SynthesisResponse {
    audio: String,
}

/// HTTP client for the speech API.
#[derive(Clone)]
pub struct SpeechClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl SpeechClient {
    /// Creates a client. A `None` or blank base URL leaves it unconfigured.
    #[must_use]
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Returns true if a base URL is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Synthesizes `request` and returns the raw PCM bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::Upstream`] carrying the upstream status on a
    /// non-success answer, and other variants for transport or decoding
    /// failures.
    pub async fn synthesize(
        &self,
        bearer: &str,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, SpeechError> {
        let base_url = self.base_url.as_deref().ok_or(SpeechError::NotConfigured)?;
        let url = format!("{base_url}/tts");

        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(request)
            .send()
            .await
            .map_err(|e| SpeechError::Transport {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "speech API error");
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
            });
        }

        let payload: SynthesisResponse =
            response
                .json()
                .await
                .map_err(|e| SpeechError::InvalidResponse {
                    details: e.to_string(),
                })?;

        STANDARD
            .decode(payload.audio.as_bytes())
            .map_err(|e| SpeechError::InvalidResponse {
                details: format!("audio is not base64: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn defaults_emotion_and_voice() {
        let request = SynthesisRequest::new("こんにちは", None, None);
        assert_eq!(request.emotion, "neutral");
        assert_eq!(request.voice, "Tomoko");

        let request = SynthesisRequest::new("hi", Some("happy".into()), Some("Kenji".into()));
        assert_eq!(request.emotion, "happy");
        assert_eq!(request.voice, "Kenji");
    }

    #[test]
    fn blank_base_url_is_unconfigured() {
        assert!(!SpeechClient::new(None).is_configured());
        assert!(!SpeechClient::new(Some("  ".into())).is_configured());
        assert!(SpeechClient::new(Some("https://speech.example.com/".into())).is_configured());
    }

    #[tokio::test]
    async fn unconfigured_client_fails_without_request() {
        let err = SpeechClient::new(None)
            .synthesize("token", &SynthesisRequest::new("hi", None, None))
            .await
            .expect_err("unconfigured");
        assert_eq!(err, SpeechError::NotConfigured);
    }

    #[tokio::test]
    async fn forwards_request_and_decodes_audio() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .and(header("authorization", "Bearer upstream-token"))
            .and(body_json(serde_json::json!({
                "text": "hello",
                "emotion": "neutral",
                "voice": "Tomoko"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "audio": STANDARD.encode([1u8, 2, 3, 4])
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SpeechClient::new(Some(format!("{}/", server.uri())));
        let audio = client
            .synthesize("upstream-token", &SynthesisRequest::new("hello", None, None))
            .await
            .expect("audio");

        assert_eq!(audio, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn upstream_status_is_carried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = SpeechClient::new(Some(server.uri()))
            .synthesize("t", &SynthesisRequest::new("hello", None, None))
            .await
            .expect_err("upstream failure");
        assert_eq!(err, SpeechError::Upstream { status: 502 });
    }

    #[tokio::test]
    async fn invalid_audio_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "audio": "***not base64***"
            })))
            .mount(&server)
            .await;

        let err = SpeechClient::new(Some(server.uri()))
            .synthesize("t", &SynthesisRequest::new("hello", None, None))
            .await
            .expect_err("decode failure");
        assert!(matches!(err, SpeechError::InvalidResponse { .. }));
    }
}
