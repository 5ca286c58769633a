//! Error types for the audio runtime.
//!
//! Engine operations are terminal at their own boundary: they log and no-op
//! instead of returning these. Errors surface only from host implementations
//! (element creation, graph construction, `play()`) and from config loading.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Track id not present in the track table
    #[error("unknown track '{0}'")]
    UnknownTrack(String),

    /// Operation needs a current playback session
    #[error("no active playback session")]
    NoActiveSession,

    /// Node chain could not be built; playback degrades to element-only
    #[error("failed to build audio node graph: {0}")]
    GraphConstruction(String),

    /// `play()` was refused (autoplay policy, decode error, ...)
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),

    /// The platform could not create a media element for the track
    #[error("media element unavailable: {0}")]
    MediaUnavailable(String),

    /// Malformed tuning / track table
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AudioError {
    pub fn graph(reason: impl Into<String>) -> Self {
        AudioError::GraphConstruction(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        AudioError::PlaybackRejected(reason.into())
    }

    pub fn media(reason: impl Into<String>) -> Self {
        AudioError::MediaUnavailable(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, AudioError>;
