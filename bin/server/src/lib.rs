//! Scensei gateway HTTP server.
//!
//! Serves the static site behind the perimeter gate and exposes the admin
//! login, WebAuthn and text-to-speech APIs under `/api`.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod tts;
