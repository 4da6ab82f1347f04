//! Text-to-speech relay.
//!
//! `POST /api/tts` forwards `{text, emotion?, voice?}` to the speech API with
//! the service bearer token and answers with the decoded PCM audio.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use scensei_integration::{SpeechError, SynthesisRequest};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct TtsRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    emotion: Option<String>,
    #[serde(default)]
    voice: Option<String>,
}

const TEXT_REQUIRED: ApiError = ApiError::BadRequest {
    message: "Text is required",
};

/// Synthesizes speech for the request body.
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: TtsRequest = serde_json::from_slice(&body).map_err(|_| TEXT_REQUIRED)?;
    let text = request
        .text
        .filter(|text| !text.is_empty())
        .ok_or(TEXT_REQUIRED)?;

    if !state.speech.is_configured() {
        return Err(SpeechError::NotConfigured.into());
    }
    let credentials = state
        .credentials
        .as_ref()
        .ok_or(ApiError::Misconfiguration {
            message: "TTS service not configured",
        })?;

    let token = credentials.get_token().await?;
    let synthesis = SynthesisRequest::new(text, request.emotion, request.voice);
    let audio = state.speech.synthesize(&token, &synthesis).await?;

    tracing::debug!(bytes = audio.len(), voice = %synthesis.voice, "synthesized speech");
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/pcm")),
            (header::CONTENT_LENGTH, HeaderValue::from(audio.len())),
        ],
        audio,
    )
        .into_response())
}
