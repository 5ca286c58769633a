//! Adaptive music mixer.
//!
//! [`AudioEngine`] owns exactly one current [`PlaybackSession`] and mediates all
//! audible output: track switching with crossfades, volume, the priority-gated
//! main filter, dance-phase sweeps and the death / perfect-beat effect bursts.
//!
//! Everything runs on the frame thread. Deferred work (delayed starts, fade
//! completion, effect phases, resume retries) is queued as timers tagged with
//! the [`RequestToken`] of the request that created them; [`AudioEngine::tick`]
//! fires due timers and drops any whose token is no longer current.
//!
//! ```
//! use beat_brawl::audio::{AudioEngine, HeadlessHost, PlayOptions};
//!
//! let mut engine = AudioEngine::new(HeadlessHost::new());
//! engine.play_track("MENU_LOOP", PlayOptions::default());
//! engine.play_track("PVP_STAGE", PlayOptions::fade_in(2.0));
//! engine.host_mut().advance(2000.0);
//! engine.tick();
//! assert_eq!(engine.current_track_name(), Some("PVP_STAGE"));
//! ```

pub mod backend;
pub mod chain;
pub mod host;
pub mod param;
pub mod session;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::collections::HashMap;

use tracing::{debug, info, warn};

pub use backend::AudioBackend;
pub use chain::{ChainParam, EffectChain};
pub use host::{AudioHost, HeadlessHost, HeadlessMedia, MediaElement, MediaEvent, MediaProbe};
pub use param::{AudioParam, Automation, Curve};
pub use session::{PlaybackSession, RequestCounter, RequestToken};

use crate::clock::music_time_from_element;
use crate::config::{MixerConfig, TrackTable, priority};
use crate::error::{AudioError, Result};
use session::{Task, Timer};

/// Options for [`AudioEngine::play_track`]. Times are in seconds.
#[derive(Default)]
pub struct PlayOptions {
    /// Crossfade (or plain fade-in) duration.
    pub fade_in: f64,
    /// Fade applied before a non-looping track reaches its end.
    pub fade_out: f64,
    /// Defer `play()`; the graph is still built immediately.
    pub delay: f64,
    /// Called once when a non-looping track ends while still current.
    pub on_end: Option<Box<dyn FnMut()>>,
}

impl PlayOptions {
    pub fn fade_in(secs: f64) -> Self {
        Self {
            fade_in: secs,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, secs: f64) -> Self {
        self.delay = secs;
        self
    }

    pub fn with_fade_out(mut self, secs: f64) -> Self {
        self.fade_out = secs;
        self
    }

    pub fn on_end(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }
}

/// Shared main-filter arbitration state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterPriority {
    pub priority: u8,
    pub target_hz: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct ResumeState {
    attempts: u32,
    last_attempt_ms: Option<f64>,
    retry_pending: bool,
}

pub struct AudioEngine<H: AudioHost> {
    host: H,
    config: MixerConfig,
    tracks: TrackTable,
    requests: RequestCounter,
    current: Option<PlaybackSession<H>>,
    outgoing: Vec<PlaybackSession<H>>, // crossfading towards silence
    timers: Vec<Timer>,
    filter: FilterPriority,
    dance_phase: bool,
    death_player: Option<usize>,
    perfect_beats: u32,
    resume: HashMap<String, ResumeState>,
}

impl<H: AudioHost> AudioEngine<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, TrackTable::default(), MixerConfig::default())
    }

    pub fn with_config(host: H, tracks: TrackTable, config: MixerConfig) -> Self {
        let filter = FilterPriority {
            priority: priority::BATTLE,
            target_hz: config.battle_lowpass_hz,
        };
        Self {
            host,
            config,
            tracks,
            requests: RequestCounter::default(),
            current: None,
            outgoing: Vec::new(),
            timers: Vec::new(),
            filter,
            dance_phase: false,
            death_player: None,
            perfect_beats: 0,
            resume: HashMap::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    // --- Queries ------------------------------------------------------------

    /// Canonical music time: the current element's playback position in ms.
    pub fn music_time_ms(&self) -> f64 {
        match &self.current {
            Some(s) => music_time_from_element(s.media.current_time(), s.media.duration()),
            None => 0.0,
        }
    }

    /// Loop length (ms) of the current track, if it loops and its duration is known.
    pub fn loop_length_ms(&self) -> Option<f64> {
        let s = self.current.as_ref().filter(|s| s.track.looping)?;
        let d = s.media.duration();
        (d.is_finite() && d > 0.0).then(|| d * 1000.0)
    }

    pub fn current_track_name(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.track.id.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().is_some_and(|s| !s.media.is_paused())
    }

    pub fn is_dance_phase(&self) -> bool {
        self.dance_phase
    }

    pub fn is_death_effect_active(&self) -> bool {
        self.death_player.is_some()
    }

    pub fn perfect_beat_count(&self) -> u32 {
        self.perfect_beats
    }

    pub fn filter_priority(&self) -> FilterPriority {
        self.filter
    }

    pub fn current_session(&self) -> Option<&PlaybackSession<H>> {
        self.current.as_ref()
    }

    pub fn active_request(&self) -> u64 {
        self.requests.active()
    }

    /// The current session, or [`AudioError::NoActiveSession`].
    pub fn require_session(&self) -> Result<&PlaybackSession<H>> {
        self.current.as_ref().ok_or(AudioError::NoActiveSession)
    }

    /// Gain of the current session at this instant.
    pub fn current_gain(&self) -> Option<f64> {
        let t = self.host.context_time();
        self.current.as_ref().map(|s| s.backend.gain_at(t))
    }

    /// Gains of sessions still fading out under a crossfade.
    pub fn fading_gains(&self) -> Vec<f64> {
        let t = self.host.context_time();
        self.outgoing.iter().map(|s| s.backend.gain_at(t)).collect()
    }

    /// Value of a chain parameter on the current session, if it has a graph.
    pub fn chain_value(&self, param: ChainParam) -> Option<f64> {
        let t = self.host.context_time();
        self.current
            .as_ref()
            .and_then(|s| s.backend.chain())
            .map(|c| c.value(param, t))
    }

    /// Timers still able to fire (tagged with the active request).
    pub fn pending_timer_count(&self) -> usize {
        self.timers
            .iter()
            .filter(|t| self.requests.is_current(t.token))
            .count()
    }

    // --- Track control ------------------------------------------------------

    /// Start `track_id`, superseding whatever is current. Returns the new
    /// session's token, or `None` when the track is unknown or unavailable.
    pub fn play_track(&mut self, track_id: &str, opts: PlayOptions) -> Option<RequestToken> {
        match self.try_play_track(track_id, opts) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(track = track_id, error = %e, "play_track ignored");
                None
            }
        }
    }

    /// [`play_track`](Self::play_track), reporting why nothing started.
    /// The current session is left untouched on error.
    pub fn try_play_track(&mut self, track_id: &str, opts: PlayOptions) -> Result<RequestToken> {
        let track = self
            .tracks
            .get(track_id)
            .cloned()
            .ok_or_else(|| AudioError::UnknownTrack(track_id.to_string()))?;
        let now_ms = self.host.now_ms();
        let t = self.host.context_time();

        let mut media = self.host.create_media(&track)?;

        // The previous session is fully invalidated before anything of the new
        // one is registered.
        let token = self.invalidate_pending();
        let previous = self.current.take();

        let crossfade = opts.fade_in > 0.0;
        let start_gain = if crossfade { 0.0 } else { track.volume };
        let mut chain = EffectChain::new(&self.config, start_gain);
        self.apply_phase_state(&mut chain, t);
        let backend = match self.host.build_graph(&mut media, &chain) {
            Ok(nodes) => AudioBackend::Graph { chain, nodes },
            Err(e) => {
                warn!(track = track_id, error = %e, "node graph unavailable, using element volume");
                media.set_volume(start_gain);
                AudioBackend::ElementOnly {
                    volume: AudioParam::new(start_gain),
                }
            }
        };

        let mut session = PlaybackSession::<H> {
            token,
            track,
            media,
            backend,
            on_end: opts.on_end,
            fade_out: opts.fade_out.max(0.0),
            end_fade_started: false,
            self_pause_until_ms: 0.0,
            started: false,
        };
        if crossfade {
            session.backend.glide_gain(t, session.track.volume, opts.fade_in);
        }

        if let Some(mut prev) = previous {
            prev.media.detach_listeners();
            if crossfade {
                prev.backend.glide_gain(t, 0.0, opts.fade_in);
                self.flush_session(&mut prev);
                self.outgoing.push(prev);
                self.schedule(now_ms + opts.fade_in * 1000.0, token, Task::FinishCrossfade);
            } else {
                self.teardown(prev, now_ms);
            }
        }

        session.media.attach_listeners();
        self.flush_session(&mut session);
        info!(track = track_id, request = token.id(), fade_in = opts.fade_in, "play_track");
        self.current = Some(session);

        if opts.delay > 0.0 {
            self.schedule(now_ms + opts.delay * 1000.0, token, Task::StartPlayback);
        } else {
            self.start_playback();
        }
        Ok(token)
    }

    /// Fade out (if `fade_out > 0`) then pause and rewind the current session.
    pub fn stop_music(&mut self, fade_out: f64) {
        if let Err(e) = self.require_session() {
            warn!(error = %e, "stop_music ignored");
            return;
        }
        let now_ms = self.host.now_ms();
        let t = self.host.context_time();
        let token = self.invalidate_pending();
        if let Some(session) = self.current.as_mut() {
            session.token = token;
        }
        if fade_out > 0.0 {
            if let Some(mut session) = self.current.take() {
                session.backend.glide_gain(t, 0.0, fade_out);
                self.flush_session(&mut session);
                self.current = Some(session);
            }
            self.schedule(now_ms + fade_out * 1000.0, token, Task::FinishStop);
        } else {
            self.finish_stop();
        }
    }

    /// Tear everything down now: current and fading sessions, every timer and
    /// all resume bookkeeping. Effect flags return to their fresh state.
    pub fn shutdown(&mut self) {
        let now_ms = self.host.now_ms();
        self.invalidate_pending();
        self.timers.clear();
        if let Some(session) = self.current.take() {
            info!(track = %session.track.id, "audio shutdown");
            self.teardown(session, now_ms);
        }
        self.resume.clear();
        self.filter = FilterPriority {
            priority: priority::BATTLE,
            target_hz: self.config.battle_lowpass_hz,
        };
        self.dance_phase = false;
        self.perfect_beats = 0;
    }

    /// Ramp the current session's gain to `volume` (clamped to 0..=1).
    pub fn set_volume(&mut self, volume: f64) {
        let v = volume.clamp(0.0, 1.0);
        let t = self.host.context_time();
        let ramp = self.config.volume_ramp_secs;
        let Some(mut session) = self.current.take() else {
            warn!(error = %AudioError::NoActiveSession, "set_volume ignored");
            return;
        };
        match &mut session.backend {
            AudioBackend::Graph { chain, .. } => {
                chain.glide(ChainParam::Master, t, v, ramp, Curve::Linear);
            }
            AudioBackend::ElementOnly { volume } => {
                volume.glide(t, v, 0.0, Curve::Linear);
                session.media.set_volume(v);
            }
        }
        self.flush_session(&mut session);
        self.current = Some(session);
    }

    // --- Filters ------------------------------------------------------------

    /// Ramp the main lowpass to `freq_hz` if `priority` is at least the
    /// current one. Returns whether the request was applied.
    pub fn set_main_filter(&mut self, freq_hz: f64, duration_secs: f64, priority: u8) -> bool {
        if priority < self.filter.priority {
            debug!(
                requested = priority,
                current = self.filter.priority,
                "main filter request below current priority"
            );
            return false;
        }
        self.filter = FilterPriority {
            priority,
            target_hz: freq_hz,
        };
        let t = self.host.context_time();
        self.with_chain(|chain| {
            chain.glide(ChainParam::MainLowpass, t, freq_hz, duration_secs, Curve::Exponential)
        });
        true
    }

    /// Back to the battle baseline; the only way priority drops to 0.
    pub fn enter_battle_phase(&mut self) {
        let t = self.host.context_time();
        let cfg = self.config.clone();
        self.filter = FilterPriority {
            priority: priority::BATTLE,
            target_hz: cfg.battle_lowpass_hz,
        };
        self.dance_phase = false;
        self.with_chain(|chain| {
            chain.glide(
                ChainParam::MainLowpass,
                t,
                cfg.battle_lowpass_hz,
                cfg.dance_filter_secs,
                Curve::Exponential,
            );
            chain.glide(ChainParam::LofiMix, t, 0.0, cfg.dance_filter_secs, Curve::Linear);
        });
    }

    pub fn start_dance_phase(&mut self) {
        if self.dance_phase {
            return;
        }
        self.dance_phase = true;
        let cfg = self.config.clone();
        let t = self.host.context_time();
        self.set_main_filter(cfg.open_lowpass_hz, cfg.dance_filter_secs, priority::DANCE_PHASE);
        // The lofi stage moves opposite to the main filter.
        self.with_chain(|chain| {
            chain.glide(ChainParam::LofiMix, t, cfg.lofi_mix, cfg.dance_filter_secs, Curve::Linear)
        });
        debug!("dance phase started");
    }

    pub fn end_dance_phase(&mut self) {
        if !self.dance_phase {
            return;
        }
        self.dance_phase = false;
        let cfg = self.config.clone();
        let t = self.host.context_time();
        let applied =
            self.set_main_filter(cfg.battle_lowpass_hz, cfg.dance_filter_secs, priority::DANCE_PHASE);
        self.with_chain(|chain| {
            chain.glide(ChainParam::LofiMix, t, 0.0, cfg.dance_filter_secs, Curve::Linear)
        });
        if applied {
            self.filter.priority = priority::BATTLE;
        }
        debug!("dance phase ended");
    }

    // --- Effects ------------------------------------------------------------

    /// Three-phase death burst: hit, recovery, reset. Ignored while active.
    pub fn trigger_death_effect(&mut self, player_index: usize) {
        if let Some(active) = self.death_player {
            debug!(player = player_index, active, "death effect already running");
            return;
        }
        let has_graph = match self.require_session() {
            Err(e) => {
                warn!(error = %e, "trigger_death_effect ignored");
                return;
            }
            Ok(s) => s.backend.is_graph(),
        };
        if !has_graph {
            debug!("death effect skipped: element-only playback");
            return;
        }
        let cfg = self.config.clone();
        let now_ms = self.host.now_ms();
        let t = self.host.context_time();
        self.death_player = Some(player_index);
        self.with_chain(|chain| {
            chain.set(ChainParam::Distortion, t, cfg.death_distortion);
            chain.set(ChainParam::Feedback, t, cfg.death_reverb_feedback);
            chain.set(ChainParam::EffectGain, t, cfg.death_reverb_mix);
        });
        self.set_main_filter(cfg.death_lowpass_hz, cfg.death_hit_secs / 3.0, priority::DEATH);
        let token = self.token_for_effects();
        self.schedule(now_ms + cfg.death_hit_secs * 1000.0, token, Task::DeathRecover);
        self.schedule(now_ms + cfg.death_total_secs * 1000.0, token, Task::DeathReset);
        info!(player = player_index, "death effect");
    }

    /// Tiered highpass / tremolo response to consecutive perfect beats.
    pub fn trigger_perfect_beat_effect(&mut self, player_index: usize) {
        if let Err(e) = self.require_session() {
            warn!(error = %e, "trigger_perfect_beat_effect ignored");
            return;
        }
        self.perfect_beats += 1;
        let tier = self.perfect_beats.min(3) as usize;
        let cfg = self.config.clone();
        let t = self.host.context_time();
        self.with_chain(|chain| {
            chain.glide(
                ChainParam::Highpass,
                t,
                cfg.perfect_highpass_hz[tier - 1],
                0.15,
                Curve::Exponential,
            );
            if tier >= 3 {
                chain.set(ChainParam::LfoRate, t, cfg.tremolo_rate_hz);
                chain.glide(ChainParam::GaterDepth, t, 1.0, 0.1, Curve::Linear);
            }
        });
        debug!(player = player_index, streak = self.perfect_beats, "perfect beat");
    }

    pub fn reset_perfect_beat_effects(&mut self) {
        self.perfect_beats = 0;
        let cfg = self.config.clone();
        let t = self.host.context_time();
        self.with_chain(|chain| {
            chain.glide(ChainParam::Highpass, t, cfg.highpass_off_hz, 0.2, Curve::Exponential);
            chain.glide(ChainParam::GaterDepth, t, 0.0, 0.1, Curve::Linear);
        });
    }

    /// Hard reset of every effect parameter and flag (match restart).
    pub fn reset_filters(&mut self) {
        let cfg = self.config.clone();
        let t = self.host.context_time();
        self.timers
            .retain(|tm| !matches!(tm.task, Task::DeathRecover | Task::DeathReset));
        self.filter = FilterPriority {
            priority: priority::BATTLE,
            target_hz: cfg.battle_lowpass_hz,
        };
        self.dance_phase = false;
        self.death_player = None;
        self.perfect_beats = 0;
        self.with_chain(|chain| chain.reset_effects(&cfg, t));
        debug!("filters reset");
    }

    // --- Frame pump ---------------------------------------------------------

    /// Fire due timers, advance element-only fades and deliver media events.
    pub fn tick(&mut self) {
        let now_ms = self.host.now_ms();
        let t = self.host.context_time();

        let mut due: Vec<Timer> = Vec::new();
        self.timers.retain(|tm| {
            if tm.due_ms <= now_ms {
                due.push(*tm);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms));
        for timer in due {
            if !self.requests.is_current(timer.token) {
                continue;
            }
            self.run_task(timer.task);
        }

        for session in self.current.iter_mut().chain(self.outgoing.iter_mut()) {
            if let AudioBackend::ElementOnly { volume } = &session.backend {
                session.media.set_volume(volume.value_at(t));
            }
        }

        self.update_end_fade(t);

        let mut events = Vec::new();
        let mut token = None;
        if let Some(session) = self.current.as_mut() {
            token = Some(session.token);
            while let Some(ev) = session.media.poll_event() {
                events.push(ev);
            }
        }
        if let Some(token) = token {
            for ev in events {
                self.handle_media_event(token, ev);
            }
        }
    }

    /// Listener entry point. Events tagged with a superseded token are dropped.
    pub fn handle_media_event(&mut self, token: RequestToken, event: MediaEvent) {
        if !self.requests.is_current(token) {
            debug!(?event, request = token.id(), "stale media event ignored");
            return;
        }
        let now_ms = self.host.now_ms();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.token != token {
            return;
        }
        match event {
            MediaEvent::Playing => {
                self.resume.remove(&session.track.id);
            }
            MediaEvent::Ended => {
                if let Some(mut cb) = session.on_end.take() {
                    cb();
                }
            }
            MediaEvent::Pause | MediaEvent::Stalled | MediaEvent::Suspend => {
                if now_ms < session.self_pause_until_ms {
                    return;
                }
                if !session.started {
                    return;
                }
                warn!(track = %session.track.id, ?event, "unexpected playback interruption");
                self.try_resume();
            }
        }
    }

    // --- Internals ----------------------------------------------------------

    fn schedule(&mut self, due_ms: f64, token: RequestToken, task: Task) {
        self.timers.push(Timer { due_ms, token, task });
    }

    /// Bump the request counter, dropping every owned timer and any session
    /// still fading out. Returns the new active token.
    fn invalidate_pending(&mut self) -> RequestToken {
        let token = self.requests.issue();
        let requests = &self.requests;
        self.timers.retain(|tm| requests.is_current(tm.token));
        let now_ms = self.host.now_ms();
        for prev in std::mem::take(&mut self.outgoing) {
            self.teardown(prev, now_ms);
        }
        if let Some(player) = self.death_player.take() {
            // Its recover/reset timers are gone; land on the baseline now.
            debug!(player, "death effect cancelled");
            self.restore_battle_baseline(0.0);
        }
        self.resume.values_mut().for_each(|r| r.retry_pending = false);
        token
    }

    /// Death parameters back to rest and the battle filter baseline, gliding
    /// over `secs`.
    fn restore_battle_baseline(&mut self, secs: f64) {
        let cfg = self.config.clone();
        let t = self.host.context_time();
        self.filter = FilterPriority {
            priority: priority::BATTLE,
            target_hz: cfg.battle_lowpass_hz,
        };
        self.dance_phase = false;
        self.with_chain(|chain| {
            for p in [ChainParam::Distortion, ChainParam::Feedback, ChainParam::EffectGain] {
                chain.set(p, t, p.default_value(&cfg));
            }
            chain.glide(ChainParam::MainLowpass, t, cfg.battle_lowpass_hz, secs, Curve::Exponential);
            chain.glide(ChainParam::LofiMix, t, 0.0, secs, Curve::Linear);
        });
    }

    /// Token effect timers are tagged with: the current session's.
    fn token_for_effects(&self) -> RequestToken {
        match &self.current {
            Some(s) => s.token,
            None => self.requests.current(),
        }
    }

    fn teardown(&mut self, mut session: PlaybackSession<H>, now_ms: f64) {
        session.media.detach_listeners();
        session.pause_self(now_ms, self.config.self_pause_guard_ms);
        if let AudioBackend::Graph { nodes, .. } = session.backend {
            self.host.release_graph(nodes);
        }
    }

    fn flush_session(&mut self, session: &mut PlaybackSession<H>) {
        if let AudioBackend::Graph { chain, nodes } = &mut session.backend {
            for (param, event) in chain.take_pending() {
                self.host.automate(nodes, param, event);
            }
        }
    }

    /// Run `f` against the current chain (if any) and mirror the result.
    fn with_chain(&mut self, f: impl FnOnce(&mut EffectChain)) {
        let Some(mut session) = self.current.take() else {
            return;
        };
        if let Some(chain) = session.backend.chain_mut() {
            f(chain);
        }
        self.flush_session(&mut session);
        self.current = Some(session);
    }

    /// New chains inherit the engine-wide filter / dance state.
    fn apply_phase_state(&self, chain: &mut EffectChain, t: f64) {
        if self.filter.target_hz != self.config.battle_lowpass_hz {
            chain.set(ChainParam::MainLowpass, t, self.filter.target_hz);
        }
        if self.dance_phase {
            chain.set(ChainParam::LofiMix, t, self.config.lofi_mix);
        }
    }

    fn start_playback(&mut self) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.started = true;
        match session.media.play() {
            Ok(()) => debug!(track = %session.track.id, "playback started"),
            // Autoplay rejections wait for the stall/resume path or a user gesture.
            Err(e) => warn!(track = %session.track.id, error = %e, "play() rejected"),
        }
    }

    fn finish_stop(&mut self) {
        let now_ms = self.host.now_ms();
        if let Some(mut session) = self.current.take() {
            session.media.detach_listeners();
            session.pause_self(now_ms, self.config.self_pause_guard_ms);
            session.media.set_current_time(0.0);
            if let AudioBackend::Graph { nodes, .. } = session.backend {
                self.host.release_graph(nodes);
            }
            info!(track = %session.track.id, "music stopped");
        }
    }

    fn try_resume(&mut self) {
        let now_ms = self.host.now_ms();
        let debounce = self.config.resume_debounce_ms;
        let max_attempts = self.config.max_resume_attempts;
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let token = session.token;
        let state = self.resume.entry(session.track.id.clone()).or_default();
        if state.attempts >= max_attempts {
            warn!(track = %session.track.id, attempts = state.attempts, "giving up on resume");
            return;
        }
        if let Some(last) = state.last_attempt_ms {
            if now_ms - last < debounce {
                if !state.retry_pending {
                    state.retry_pending = true;
                    let due = last + debounce;
                    self.timers.push(Timer {
                        due_ms: due,
                        token,
                        task: Task::RetryResume,
                    });
                }
                return;
            }
        }
        state.attempts += 1;
        state.last_attempt_ms = Some(now_ms);
        state.retry_pending = false;
        let attempt = state.attempts;
        match session.media.play() {
            Ok(()) => info!(track = %session.track.id, attempt, "playback resumed"),
            Err(e) => warn!(track = %session.track.id, attempt, error = %e, "resume failed"),
        }
    }

    fn update_end_fade(&mut self, t: f64) {
        let Some(mut session) = self.current.take() else {
            return;
        };
        if !session.track.looping && session.fade_out > 0.0 && !session.end_fade_started {
            let remaining = session.media.duration() - session.media.current_time();
            if remaining.is_finite() && remaining <= session.fade_out && !session.media.is_paused() {
                session.end_fade_started = true;
                session.backend.glide_gain(t, 0.0, remaining.max(0.0));
                self.flush_session(&mut session);
            }
        }
        self.current = Some(session);
    }

    fn run_task(&mut self, task: Task) {
        let now_ms = self.host.now_ms();
        let t = self.host.context_time();
        let cfg = self.config.clone();
        match task {
            Task::StartPlayback => self.start_playback(),
            Task::FinishCrossfade => {
                for prev in std::mem::take(&mut self.outgoing) {
                    self.teardown(prev, now_ms);
                }
            }
            Task::FinishStop => self.finish_stop(),
            Task::RetryResume => {
                let still_paused = self.current.as_ref().is_some_and(|s| s.media.is_paused());
                if let Some(session) = self.current.as_ref() {
                    if let Some(state) = self.resume.get_mut(&session.track.id) {
                        state.retry_pending = false;
                    }
                }
                if still_paused {
                    self.try_resume();
                }
            }
            Task::DeathRecover => {
                self.with_chain(|chain| {
                    chain.glide(ChainParam::Distortion, t, 0.0, cfg.death_recover_secs, Curve::Linear);
                    chain.glide(ChainParam::Feedback, t, 0.0, cfg.death_recover_secs, Curve::Linear);
                    chain.glide(ChainParam::EffectGain, t, 0.0, cfg.death_recover_secs, Curve::Linear);
                });
                self.set_main_filter(cfg.battle_lowpass_hz, cfg.death_recover_secs, priority::DEATH);
            }
            Task::DeathReset => {
                self.death_player = None;
                self.restore_battle_baseline(cfg.dance_filter_secs);
                debug!("death effect finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_track_is_a_noop() {
        let mut engine = AudioEngine::new(HeadlessHost::new());
        assert!(engine.play_track("NOT_A_TRACK", PlayOptions::default()).is_none());
        assert!(engine.current_track_name().is_none());
        assert!(engine.host().elements().is_empty());
    }

    #[test]
    fn misuse_reports_the_matching_error() {
        let mut engine = AudioEngine::new(HeadlessHost::new());
        assert!(matches!(engine.require_session(), Err(AudioError::NoActiveSession)));
        assert!(matches!(
            engine.try_play_track("NOPE", PlayOptions::default()),
            Err(AudioError::UnknownTrack(id)) if id == "NOPE"
        ));

        engine.play_track("MENU_LOOP", PlayOptions::default());
        engine.host_mut().fail_media = true;
        assert!(matches!(
            engine.try_play_track("PVP_STAGE", PlayOptions::default()),
            Err(AudioError::MediaUnavailable(_))
        ));
        // A failed start leaves the current session alone.
        assert_eq!(engine.current_track_name(), Some("MENU_LOOP"));
        assert!(engine.require_session().is_ok());
        assert_eq!(engine.active_request(), 1);
    }

    #[test]
    fn music_time_follows_element_position() {
        let mut engine = AudioEngine::new(HeadlessHost::new());
        assert_eq!(engine.music_time_ms(), 0.0);
        engine.play_track("MENU_LOOP", PlayOptions::default());
        engine.host_mut().advance(1500.0);
        assert!((engine.music_time_ms() - 1500.0).abs() < 1e-6);
        engine.host().last_element().unwrap().set_duration(f64::NAN);
        assert_eq!(engine.music_time_ms(), 0.0);
    }

    #[test]
    fn delayed_start_builds_graph_but_defers_play() {
        let mut engine = AudioEngine::new(HeadlessHost::new());
        engine.play_track("PVP_STAGE", PlayOptions::default().with_delay(0.5));
        assert_eq!(engine.host().graphs_built(), 1);
        assert!(!engine.is_playing());
        engine.host_mut().advance(499.0);
        engine.tick();
        assert!(!engine.is_playing());
        engine.host_mut().advance(1.0);
        engine.tick();
        assert!(engine.is_playing());
    }
}
