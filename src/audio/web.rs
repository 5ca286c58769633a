//! Browser platform: `<audio>` elements routed through a Web Audio node chain.
//!
//! The engine keeps the authoritative automation timelines; this host only
//! mirrors each event onto the matching real `AudioParam`. [`GameAudio`] is the
//! JS-facing wrapper the page drives from its frame loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AudioContext, AudioContextState, AudioNode, AudioParam as WebParam, AudioScheduledSourceNode,
    BiquadFilterNode, BiquadFilterType, DelayNode, Event, GainNode, HtmlAudioElement,
    MediaElementAudioSourceNode, OscillatorNode, OscillatorType, WaveShaperNode,
};

use super::chain::{ChainParam, EffectChain, distortion_curve};
use super::host::{AudioHost, MediaElement, MediaEvent};
use super::param::Automation;
use super::{AudioEngine, PlayOptions};
use crate::config::TrackDescriptor;
#[cfg(feature = "serde_json")]
use crate::config::{MixerConfig, TrackTable};
use crate::drift::BeatSync;
use crate::error::{AudioError, Result};

const CURVE_SAMPLES: usize = 1024;

fn performance_now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

fn js_err(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

// --- Media ------------------------------------------------------------------

type Listener = Closure<dyn FnMut(Event)>;
type RejectHandler = Rc<Closure<dyn FnMut(JsValue)>>;

pub struct BrowserMedia {
    el: HtmlAudioElement,
    events: Rc<RefCell<VecDeque<MediaEvent>>>,
    listeners: Vec<(&'static str, Listener)>,
    on_reject: RejectHandler,
}

const LISTENED: [(&str, MediaEvent); 5] = [
    ("playing", MediaEvent::Playing),
    ("pause", MediaEvent::Pause),
    ("stalled", MediaEvent::Stalled),
    ("suspend", MediaEvent::Suspend),
    ("ended", MediaEvent::Ended),
];

impl MediaElement for BrowserMedia {
    fn play(&mut self) -> Result<()> {
        let promise = self.el.play().map_err(|e| AudioError::rejected(js_err(&e)))?;
        // Autoplay rejections arrive asynchronously; they are only logged.
        let _ = promise.catch(&self.on_reject);
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(e) = self.el.pause() {
            warn!(error = %js_err(&e), "pause() failed");
        }
    }

    fn is_paused(&self) -> bool {
        self.el.paused()
    }

    fn current_time(&self) -> f64 {
        self.el.current_time()
    }

    fn set_current_time(&mut self, secs: f64) {
        self.el.set_current_time(secs);
    }

    fn duration(&self) -> f64 {
        self.el.duration()
    }

    fn set_volume(&mut self, volume: f64) {
        self.el.set_volume(volume.clamp(0.0, 1.0));
    }

    fn volume(&self) -> f64 {
        self.el.volume()
    }

    fn attach_listeners(&mut self) {
        if !self.listeners.is_empty() {
            return;
        }
        for (name, event) in LISTENED {
            let queue = self.events.clone();
            let cb = Closure::wrap(Box::new(move |_evt: Event| {
                queue.borrow_mut().push_back(event);
            }) as Box<dyn FnMut(Event)>);
            if let Err(e) = self
                .el
                .add_event_listener_with_callback(name, cb.as_ref().unchecked_ref())
            {
                warn!(event = name, error = %js_err(&e), "addEventListener failed");
                continue;
            }
            self.listeners.push((name, cb));
        }
    }

    fn detach_listeners(&mut self) {
        for (name, cb) in self.listeners.drain(..) {
            let _ = self
                .el
                .remove_event_listener_with_callback(name, cb.as_ref().unchecked_ref());
        }
        self.events.borrow_mut().clear();
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.events.borrow_mut().pop_front()
    }
}

// --- Node chain -------------------------------------------------------------

pub struct BrowserNodes {
    source: MediaElementAudioSourceNode,
    shaper: WaveShaperNode,
    delay: DelayNode,
    feedback: GainNode,
    effect_gain: GainNode,
    highpass: BiquadFilterNode,
    lofi_filter: BiquadFilterNode,
    lofi_gain: GainNode,
    lowpass: BiquadFilterNode,
    gater: GainNode,
    lfo: OscillatorNode,
    lfo_depth: GainNode,
    master: GainNode,
}

impl BrowserNodes {
    fn param(&self, p: ChainParam) -> Option<WebParam> {
        Some(match p {
            ChainParam::Distortion => return None,
            ChainParam::DelayTime => self.delay.delay_time(),
            ChainParam::Feedback => self.feedback.gain(),
            ChainParam::EffectGain => self.effect_gain.gain(),
            ChainParam::Highpass => self.highpass.frequency(),
            ChainParam::LofiCutoff => self.lofi_filter.frequency(),
            ChainParam::LofiMix => self.lofi_gain.gain(),
            ChainParam::MainLowpass => self.lowpass.frequency(),
            ChainParam::LfoRate => self.lfo.frequency(),
            ChainParam::GaterDepth => self.lfo_depth.gain(),
            ChainParam::Master => self.master.gain(),
        })
    }

    fn set_curve(&self, amount: f64) {
        let curve = js_sys::Float32Array::from(&distortion_curve(amount, CURVE_SAMPLES)[..]);
        if let Err(e) = js_sys::Reflect::set(&self.shaper, &JsValue::from_str("curve"), &curve) {
            warn!(error = %js_err(&e), "waveshaper curve rejected");
        }
    }

    fn all(&self) -> [&AudioNode; 13] {
        [
            &self.source,
            &self.shaper,
            &self.delay,
            &self.feedback,
            &self.effect_gain,
            &self.highpass,
            &self.lofi_filter,
            &self.lofi_gain,
            &self.lowpass,
            &self.gater,
            &self.lfo,
            &self.lfo_depth,
            &self.master,
        ]
    }
}

// LFO depth maps 0..=1 onto a ±0.5 swing of the gater gain.
fn mirror_scale(p: ChainParam, v: f64) -> f32 {
    match p {
        ChainParam::GaterDepth => (v * 0.5) as f32,
        _ => v as f32,
    }
}

// --- Host -------------------------------------------------------------------

pub struct BrowserHost {
    ctx: Option<AudioContext>,
    // One handler for every play() promise; it outlives torn-down elements
    // whose promise rejects after the pause.
    on_reject: RejectHandler,
}

impl Default for BrowserHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserHost {
    pub fn new() -> Self {
        let on_reject = Closure::<dyn FnMut(JsValue)>::new(|e: JsValue| {
            warn!(error = %js_err(&e), "play() promise rejected");
        });
        Self {
            ctx: None,
            on_reject: Rc::new(on_reject),
        }
    }

    fn context(&mut self) -> Result<AudioContext> {
        if let Some(ctx) = &self.ctx {
            return Ok(ctx.clone());
        }
        let ctx = AudioContext::new().map_err(|e| AudioError::graph(js_err(&e)))?;
        self.ctx = Some(ctx.clone());
        Ok(ctx)
    }

    fn wire(ctx: &AudioContext, media: &BrowserMedia) -> std::result::Result<BrowserNodes, JsValue> {
        let nodes = BrowserNodes {
            source: ctx.create_media_element_source(&media.el)?,
            shaper: ctx.create_wave_shaper()?,
            delay: ctx.create_delay()?,
            feedback: ctx.create_gain()?,
            effect_gain: ctx.create_gain()?,
            highpass: ctx.create_biquad_filter()?,
            lofi_filter: ctx.create_biquad_filter()?,
            lofi_gain: ctx.create_gain()?,
            lowpass: ctx.create_biquad_filter()?,
            gater: ctx.create_gain()?,
            lfo: ctx.create_oscillator()?,
            lfo_depth: ctx.create_gain()?,
            master: ctx.create_gain()?,
        };
        nodes.highpass.set_type(BiquadFilterType::Highpass);
        nodes.lofi_filter.set_type(BiquadFilterType::Lowpass);
        nodes.lowpass.set_type(BiquadFilterType::Lowpass);
        nodes.lfo.set_type(OscillatorType::Sine);

        // dry: source → shaper → highpass; wet: shaper → delay ⟲ feedback → effect gain → highpass
        nodes.source.connect_with_audio_node(&nodes.shaper)?;
        nodes.shaper.connect_with_audio_node(&nodes.highpass)?;
        nodes.shaper.connect_with_audio_node(&nodes.delay)?;
        nodes.delay.connect_with_audio_node(&nodes.feedback)?;
        nodes.feedback.connect_with_audio_node(&nodes.delay)?;
        nodes.delay.connect_with_audio_node(&nodes.effect_gain)?;
        nodes.effect_gain.connect_with_audio_node(&nodes.highpass)?;
        // highpass → main lowpass, plus the parallel lofi stage
        nodes.highpass.connect_with_audio_node(&nodes.lowpass)?;
        nodes.highpass.connect_with_audio_node(&nodes.lofi_filter)?;
        nodes.lofi_filter.connect_with_audio_node(&nodes.lofi_gain)?;
        nodes.lofi_gain.connect_with_audio_node(&nodes.lowpass)?;
        // gater: LFO × depth modulates the gater gain
        nodes.lowpass.connect_with_audio_node(&nodes.gater)?;
        nodes.lfo.connect_with_audio_node(&nodes.lfo_depth)?;
        nodes.lfo_depth.connect_with_audio_param(&nodes.gater.gain())?;
        nodes.gater.connect_with_audio_node(&nodes.master)?;
        nodes.master.connect_with_audio_node(&ctx.destination())?;

        let lfo: &AudioScheduledSourceNode = &nodes.lfo;
        lfo.start()?;
        Ok(nodes)
    }
}

impl AudioHost for BrowserHost {
    type Media = BrowserMedia;
    type Nodes = BrowserNodes;

    fn now_ms(&self) -> f64 {
        performance_now()
    }

    fn context_time(&self) -> f64 {
        match &self.ctx {
            Some(ctx) => ctx.current_time(),
            None => performance_now() / 1000.0,
        }
    }

    fn create_media(&mut self, track: &TrackDescriptor) -> Result<BrowserMedia> {
        let el = HtmlAudioElement::new_with_src(&track.source).map_err(|e| AudioError::media(js_err(&e)))?;
        el.set_loop(track.looping);
        el.set_preload("auto");
        Ok(BrowserMedia {
            el,
            events: Rc::new(RefCell::new(VecDeque::new())),
            listeners: Vec::new(),
            on_reject: self.on_reject.clone(),
        })
    }

    fn build_graph(&mut self, media: &mut BrowserMedia, chain: &EffectChain) -> Result<BrowserNodes> {
        let ctx = self.context()?;
        if ctx.state() == AudioContextState::Suspended {
            let _ = ctx.resume();
        }
        let nodes = Self::wire(&ctx, media).map_err(|e| AudioError::graph(js_err(&e)))?;
        let t = ctx.current_time();
        for p in ChainParam::ALL {
            let v = chain.value(p, t);
            match nodes.param(p) {
                Some(param) => param.set_value(mirror_scale(p, v)),
                None => nodes.set_curve(v),
            }
        }
        nodes.gater.gain().set_value(1.0);
        debug!("audio node chain built");
        Ok(nodes)
    }

    fn automate(&mut self, nodes: &BrowserNodes, param: ChainParam, event: Automation) {
        let Some(target) = nodes.param(param) else {
            // The waveshaper has no AudioParam: jump straight to the target curve.
            match event {
                Automation::SetValue { value, .. }
                | Automation::LinearRamp { value, .. }
                | Automation::ExponentialRamp { value, .. } => nodes.set_curve(value),
                Automation::Cancel { .. } => {}
            }
            return;
        };
        let res = match event {
            Automation::SetValue { time, value } => target
                .set_value_at_time(mirror_scale(param, value), time)
                .map(|_| ()),
            Automation::LinearRamp { time, value } => target
                .linear_ramp_to_value_at_time(mirror_scale(param, value), time)
                .map(|_| ()),
            Automation::ExponentialRamp { time, value } => target
                .exponential_ramp_to_value_at_time(mirror_scale(param, value), time)
                .map(|_| ()),
            Automation::Cancel { time } => target.cancel_scheduled_values(time).map(|_| ()),
        };
        if let Err(e) = res {
            warn!(?param, error = %js_err(&e), "automation rejected");
        }
    }

    fn release_graph(&mut self, nodes: BrowserNodes) {
        let lfo: &AudioScheduledSourceNode = &nodes.lfo;
        let _ = lfo.stop();
        for node in nodes.all() {
            let _ = node.disconnect();
        }
    }
}

// --- JS facade --------------------------------------------------------------

/// Mixer + drift corrector as seen from the page.
///
/// Drift is measured from the moment the current track starts playing;
/// `markStageStart` re-anchors it explicitly.
#[wasm_bindgen]
pub struct GameAudio {
    engine: AudioEngine<BrowserHost>,
    sync: BeatSync,
}

impl Default for GameAudio {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl GameAudio {
    #[wasm_bindgen(constructor)]
    pub fn new() -> GameAudio {
        GameAudio {
            engine: AudioEngine::new(BrowserHost::new()),
            sync: BeatSync::default(),
        }
    }

    #[wasm_bindgen(js_name = playTrack)]
    pub fn play_track(
        &mut self,
        id: &str,
        fade_in: f64,
        fade_out: f64,
        delay: f64,
        on_end: Option<js_sys::Function>,
    ) -> bool {
        let mut opts = PlayOptions::fade_in(fade_in)
            .with_fade_out(fade_out)
            .with_delay(delay);
        if let Some(f) = on_end {
            opts = opts.on_end(move || {
                let _ = f.call0(&JsValue::NULL);
            });
        }
        if self.engine.play_track(id, opts).is_none() {
            return false;
        }
        self.sync.anchor(performance_now() + delay.max(0.0) * 1000.0);
        true
    }

    #[wasm_bindgen(js_name = stopMusic)]
    pub fn stop_music(&mut self, fade_out: f64) {
        self.engine.stop_music(fade_out);
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        self.sync.clear();
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, v: f64) {
        self.engine.set_volume(v);
    }

    #[wasm_bindgen(js_name = setMainFilter)]
    pub fn set_main_filter(&mut self, freq_hz: f64, duration_secs: f64, priority: u8) -> bool {
        self.engine.set_main_filter(freq_hz, duration_secs, priority)
    }

    #[wasm_bindgen(js_name = enterBattlePhase)]
    pub fn enter_battle_phase(&mut self) {
        self.engine.enter_battle_phase();
    }

    #[wasm_bindgen(js_name = startDancePhase)]
    pub fn start_dance_phase(&mut self) {
        self.engine.start_dance_phase();
    }

    #[wasm_bindgen(js_name = endDancePhase)]
    pub fn end_dance_phase(&mut self) {
        self.engine.end_dance_phase();
    }

    #[wasm_bindgen(js_name = triggerDeathEffect)]
    pub fn trigger_death_effect(&mut self, player_index: usize) {
        self.engine.trigger_death_effect(player_index);
    }

    #[wasm_bindgen(js_name = triggerPerfectBeatEffect)]
    pub fn trigger_perfect_beat_effect(&mut self, player_index: usize) {
        self.engine.trigger_perfect_beat_effect(player_index);
    }

    #[wasm_bindgen(js_name = resetPerfectBeatEffects)]
    pub fn reset_perfect_beat_effects(&mut self) {
        self.engine.reset_perfect_beat_effects();
    }

    #[wasm_bindgen(js_name = resetFilters)]
    pub fn reset_filters(&mut self) {
        self.engine.reset_filters();
    }

    /// Stage clock starts now; drift is measured against it.
    #[wasm_bindgen(js_name = markStageStart)]
    pub fn mark_stage_start(&mut self) {
        self.sync.anchor(performance_now());
    }

    /// Per-frame pump.
    pub fn tick(&mut self) {
        self.engine.tick();
        self.sync.update(&self.engine);
    }

    #[wasm_bindgen(getter, js_name = musicTimeMs)]
    pub fn music_time_ms(&self) -> f64 {
        self.engine.music_time_ms()
    }

    #[wasm_bindgen(getter, js_name = beatOffsetMs)]
    pub fn beat_offset_ms(&self) -> f64 {
        self.sync.beat_offset_ms()
    }

    #[wasm_bindgen(getter, js_name = currentTrackName)]
    pub fn current_track_name(&self) -> Option<String> {
        self.engine.current_track_name().map(str::to_string)
    }

    #[wasm_bindgen(getter, js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    #[wasm_bindgen(getter, js_name = isDancePhase)]
    pub fn is_dance_phase(&self) -> bool {
        self.engine.is_dance_phase()
    }

    #[wasm_bindgen(getter, js_name = perfectBeatCount)]
    pub fn perfect_beat_count(&self) -> u32 {
        self.engine.perfect_beat_count()
    }
}

#[cfg(feature = "serde_json")]
#[wasm_bindgen]
impl GameAudio {
    /// Replace the track table with a JSON array of descriptors.
    #[wasm_bindgen(js_name = loadTracks)]
    pub fn load_tracks(&mut self, json: &str) -> std::result::Result<(), JsValue> {
        let table = TrackTable::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.shutdown();
        self.engine = AudioEngine::with_config(BrowserHost::new(), table, MixerConfig::default());
        Ok(())
    }
}
