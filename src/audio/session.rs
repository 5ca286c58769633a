//! Playback sessions and the generation counter that invalidates them.

use super::backend::AudioBackend;
use super::host::{AudioHost, MediaElement};
use crate::config::TrackDescriptor;

/// Generation id captured by every timer and listener a session owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Monotonic active-request counter. Cancelling means bumping it: anything
/// tagged with an older token turns into a no-op the next time it runs.
#[derive(Debug, Default)]
pub struct RequestCounter {
    active: u64,
}

impl RequestCounter {
    pub fn issue(&mut self) -> RequestToken {
        self.active += 1;
        RequestToken(self.active)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.active
    }

    pub fn active(&self) -> u64 {
        self.active
    }

    pub(crate) fn current(&self) -> RequestToken {
        RequestToken(self.active)
    }
}

/// Deferred work owned by a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    StartPlayback,
    FinishCrossfade,
    FinishStop,
    RetryResume,
    DeathRecover,
    DeathReset,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Timer {
    pub due_ms: f64,
    pub token: RequestToken,
    pub task: Task,
}

/// One `play_track` call: the element, its output backend and its bookkeeping.
pub struct PlaybackSession<H: AudioHost> {
    pub(crate) token: RequestToken,
    pub(crate) track: TrackDescriptor,
    pub(crate) media: H::Media,
    pub(crate) backend: AudioBackend<H::Nodes>,
    pub(crate) on_end: Option<Box<dyn FnMut()>>,
    pub(crate) fade_out: f64,
    pub(crate) end_fade_started: bool,
    pub(crate) self_pause_until_ms: f64,
    pub(crate) started: bool,
}

impl<H: AudioHost> PlaybackSession<H> {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn track(&self) -> &TrackDescriptor {
        &self.track
    }

    pub fn backend(&self) -> &AudioBackend<H::Nodes> {
        &self.backend
    }

    pub fn media(&self) -> &H::Media {
        &self.media
    }

    /// Pause on our own behalf; the guard keeps the resulting `pause` event
    /// from being mistaken for a browser-induced stall.
    pub(crate) fn pause_self(&mut self, now_ms: f64, guard_ms: f64) {
        self.self_pause_until_ms = now_ms + guard_ms;
        self.media.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_token_is_current() {
        let mut counter = RequestCounter::default();
        let a = counter.issue();
        let b = counter.issue();
        assert!(!counter.is_current(a));
        assert!(counter.is_current(b));
        assert_eq!(counter.active(), 2);
        assert_ne!(a.id(), b.id());
    }
}
