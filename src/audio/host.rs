//! Platform seam for the mixer.
//!
//! [`AudioHost`] is everything the engine needs from the platform: a monotonic
//! clock, media elements, and (optionally) a node graph that mirrors the
//! modelled [`EffectChain`]. The browser implementation lives in `web.rs`;
//! [`HeadlessHost`] simulates one with a manual clock for native builds/tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::chain::{ChainParam, EffectChain};
use super::param::Automation;
use crate::config::TrackDescriptor;
use crate::error::{AudioError, Result};

/// Events a media element reports through its listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    Playing,
    Pause,
    Stalled,
    Suspend,
    Ended,
}

/// The `<audio>` element contract.
pub trait MediaElement {
    /// Start (or resume) playback. Rejections are reported, never retried here.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);
    /// Duration in seconds; `NaN` until metadata is known.
    fn duration(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn volume(&self) -> f64;
    fn attach_listeners(&mut self);
    /// Detach listeners and drop any undelivered events.
    fn detach_listeners(&mut self);
    fn poll_event(&mut self) -> Option<MediaEvent>;
}

pub trait AudioHost {
    type Media: MediaElement;
    type Nodes;

    /// Monotonic wall clock in milliseconds.
    fn now_ms(&self) -> f64;

    /// Audio context time in seconds (automation timeline).
    fn context_time(&self) -> f64 {
        self.now_ms() / 1000.0
    }

    fn create_media(&mut self, track: &TrackDescriptor) -> Result<Self::Media>;

    /// Build and connect the node chain for `media`, initialised from `chain`.
    fn build_graph(&mut self, media: &mut Self::Media, chain: &EffectChain) -> Result<Self::Nodes>;

    /// Mirror one automation event onto the real node parameter.
    fn automate(&mut self, nodes: &Self::Nodes, param: ChainParam, event: Automation);

    /// Disconnect a chain whose session has been torn down.
    fn release_graph(&mut self, _nodes: Self::Nodes) {}
}

// --- Headless platform ------------------------------------------------------

#[derive(Debug)]
struct MediaState {
    track_id: String,
    duration: f64,
    looping: bool,
    volume: f64,
    paused: bool,
    position: f64,  // seconds at `anchor_ms`
    anchor_ms: f64, // clock reading when position was last fixed
    listeners: bool,
    attach_count: u32,
    detach_count: u32,
    play_calls: u32,
    reject_play: bool,
    ended_emitted: bool,
    events: VecDeque<MediaEvent>,
}

/// Simulated media element; position advances with the host clock.
pub struct HeadlessMedia {
    clock: Rc<Cell<f64>>,
    state: Rc<RefCell<MediaState>>,
}

impl HeadlessMedia {
    fn position_now(&self, st: &MediaState) -> f64 {
        if st.paused {
            return st.position;
        }
        let pos = st.position + (self.clock.get() - st.anchor_ms) / 1000.0;
        if st.looping && st.duration.is_finite() && st.duration > 0.0 {
            pos % st.duration
        } else if st.duration.is_finite() {
            pos.min(st.duration)
        } else {
            pos
        }
    }

    fn freeze(&self, st: &mut MediaState) {
        st.position = self.position_now(st);
        st.anchor_ms = self.clock.get();
    }
}

impl MediaElement for HeadlessMedia {
    fn play(&mut self) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.play_calls += 1;
        if st.reject_play {
            return Err(AudioError::rejected("NotAllowedError: autoplay blocked"));
        }
        if st.paused {
            st.paused = false;
            st.anchor_ms = self.clock.get();
            st.ended_emitted = false;
            if st.listeners {
                st.events.push_back(MediaEvent::Playing);
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut st = self.state.borrow_mut();
        if st.paused {
            return;
        }
        self.freeze(&mut st);
        st.paused = true;
        if st.listeners {
            st.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn current_time(&self) -> f64 {
        let st = self.state.borrow();
        self.position_now(&st)
    }

    fn set_current_time(&mut self, secs: f64) {
        let mut st = self.state.borrow_mut();
        st.position = secs.max(0.0);
        st.anchor_ms = self.clock.get();
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.borrow_mut().volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    fn attach_listeners(&mut self) {
        let mut st = self.state.borrow_mut();
        st.listeners = true;
        st.attach_count += 1;
    }

    fn detach_listeners(&mut self) {
        let mut st = self.state.borrow_mut();
        if st.listeners {
            st.detach_count += 1;
        }
        st.listeners = false;
        st.events.clear();
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        let mut st = self.state.borrow_mut();
        if !st.paused && !st.looping && !st.ended_emitted && st.duration.is_finite() {
            let pos = self.position_now(&st);
            if pos >= st.duration {
                st.position = st.duration;
                st.anchor_ms = self.clock.get();
                st.paused = true;
                st.ended_emitted = true;
                if st.listeners {
                    st.events.push_back(MediaEvent::Ended);
                }
            }
        }
        st.events.pop_front()
    }
}

/// Test-side view of an element created by [`HeadlessHost`].
#[derive(Clone)]
pub struct MediaProbe {
    clock: Rc<Cell<f64>>,
    state: Rc<RefCell<MediaState>>,
}

impl MediaProbe {
    pub fn track_id(&self) -> String {
        self.state.borrow().track_id.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    pub fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    pub fn current_time(&self) -> f64 {
        HeadlessMedia {
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
        .current_time()
    }

    pub fn listeners_attached(&self) -> bool {
        self.state.borrow().listeners
    }

    pub fn attach_count(&self) -> u32 {
        self.state.borrow().attach_count
    }

    pub fn detach_count(&self) -> u32 {
        self.state.borrow().detach_count
    }

    pub fn play_calls(&self) -> u32 {
        self.state.borrow().play_calls
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.state.borrow_mut().reject_play = reject;
    }

    pub fn set_duration(&self, secs: f64) {
        self.state.borrow_mut().duration = secs;
    }

    /// Simulate a browser-originated event. `Pause`/`Stalled`/`Suspend`
    /// leave the element paused the way a stalled stream does.
    pub fn emit(&self, event: MediaEvent) {
        let media = HeadlessMedia {
            clock: self.clock.clone(),
            state: self.state.clone(),
        };
        let mut st = self.state.borrow_mut();
        if matches!(event, MediaEvent::Pause | MediaEvent::Stalled | MediaEvent::Suspend)
            && !st.paused
        {
            media.freeze(&mut st);
            st.paused = true;
        }
        if st.listeners {
            st.events.push_back(event);
        }
    }
}

/// Graph handle returned by [`HeadlessHost::build_graph`].
#[derive(Debug)]
pub struct HeadlessNodes {
    pub id: usize,
}

/// Simulated platform with a manual clock, failure injection and spy counters.
pub struct HeadlessHost {
    clock: Rc<Cell<f64>>,
    elements: Vec<MediaProbe>,
    graphs_built: usize,
    graphs_released: usize,
    automation_events: usize,
    pub fail_graph: bool,
    pub reject_play: bool,
    pub fail_media: bool,
    pub duration_secs: f64,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            clock: Rc::new(Cell::new(0.0)),
            elements: Vec::new(),
            graphs_built: 0,
            graphs_released: 0,
            automation_events: 0,
            fail_graph: false,
            reject_play: false,
            fail_media: false,
            duration_secs: 180.0,
        }
    }

    pub fn advance(&mut self, ms: f64) {
        self.clock.set(self.clock.get() + ms);
    }

    pub fn set_now(&mut self, ms: f64) {
        self.clock.set(ms);
    }

    pub fn elements(&self) -> &[MediaProbe] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&MediaProbe> {
        self.elements.get(index)
    }

    pub fn last_element(&self) -> Option<&MediaProbe> {
        self.elements.last()
    }

    pub fn graphs_built(&self) -> usize {
        self.graphs_built
    }

    pub fn graphs_released(&self) -> usize {
        self.graphs_released
    }

    pub fn automation_events(&self) -> usize {
        self.automation_events
    }
}

impl AudioHost for HeadlessHost {
    type Media = HeadlessMedia;
    type Nodes = HeadlessNodes;

    fn now_ms(&self) -> f64 {
        self.clock.get()
    }

    fn create_media(&mut self, track: &TrackDescriptor) -> Result<HeadlessMedia> {
        if self.fail_media {
            return Err(AudioError::media(format!("cannot open '{}'", track.source)));
        }
        let state = Rc::new(RefCell::new(MediaState {
            track_id: track.id.clone(),
            duration: self.duration_secs,
            looping: track.looping,
            volume: 1.0,
            paused: true,
            position: 0.0,
            anchor_ms: self.clock.get(),
            listeners: false,
            attach_count: 0,
            detach_count: 0,
            play_calls: 0,
            reject_play: self.reject_play,
            ended_emitted: false,
            events: VecDeque::new(),
        }));
        self.elements.push(MediaProbe {
            clock: self.clock.clone(),
            state: state.clone(),
        });
        Ok(HeadlessMedia {
            clock: self.clock.clone(),
            state,
        })
    }

    fn build_graph(&mut self, _media: &mut HeadlessMedia, _chain: &EffectChain) -> Result<HeadlessNodes> {
        if self.fail_graph {
            return Err(AudioError::graph("AudioContext unavailable"));
        }
        self.graphs_built += 1;
        Ok(HeadlessNodes {
            id: self.graphs_built,
        })
    }

    fn automate(&mut self, _nodes: &HeadlessNodes, _param: ChainParam, _event: Automation) {
        self.automation_events += 1;
    }

    fn release_graph(&mut self, _nodes: HeadlessNodes) {
        self.graphs_released += 1;
    }
}
