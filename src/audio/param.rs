//! Automation timeline for a single audio parameter.
//!
//! Mirrors the Web Audio `AudioParam` scheduling model closely enough that the
//! engine can reason about gains and cutoffs at any context time without asking
//! the browser: events are kept sorted by time, a ramp starts at the previous
//! event, and `cancel_and_hold` freezes whatever value is current.

/// Smallest value an exponential ramp may target (exponential curves cannot
/// cross or touch zero).
pub const MIN_EXP_VALUE: f64 = 1e-4;

/// One scheduled automation event, in context seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Automation {
    SetValue { time: f64, value: f64 },
    LinearRamp { time: f64, value: f64 },
    ExponentialRamp { time: f64, value: f64 },
    /// Drop everything scheduled at or after `time`. Only ever forwarded to
    /// hosts; never stored in a timeline.
    Cancel { time: f64 },
}

impl Automation {
    pub fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. }
            | Automation::LinearRamp { time, .. }
            | Automation::ExponentialRamp { time, .. }
            | Automation::Cancel { time } => time,
        }
    }

    fn value(&self) -> Option<f64> {
        match *self {
            Automation::SetValue { value, .. }
            | Automation::LinearRamp { value, .. }
            | Automation::ExponentialRamp { value, .. } => Some(value),
            Automation::Cancel { .. } => None,
        }
    }
}

/// Ramp shape used by [`AudioParam::glide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Exponential,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioParam {
    initial: f64,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        Self {
            initial: value,
            events: Vec::new(),
        }
    }

    pub fn scheduled(&self) -> &[Automation] {
        &self.events
    }

    fn insert(&mut self, event: Automation) -> Automation {
        // Same-time events keep insertion order.
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
        event
    }

    pub fn set_value_at(&mut self, value: f64, time: f64) -> Automation {
        self.insert(Automation::SetValue { time, value })
    }

    pub fn linear_ramp_to(&mut self, value: f64, end_time: f64) -> Automation {
        self.insert(Automation::LinearRamp {
            time: end_time,
            value,
        })
    }

    pub fn exponential_ramp_to(&mut self, value: f64, end_time: f64) -> Automation {
        self.insert(Automation::ExponentialRamp {
            time: end_time,
            value: value.max(MIN_EXP_VALUE),
        })
    }

    /// Freeze the value at `time`, dropping every later event.
    pub fn cancel_and_hold(&mut self, time: f64) -> Vec<Automation> {
        let held = self.value_at(time);
        self.events.retain(|e| e.time() < time);
        let set = self.set_value_at(held, time);
        vec![Automation::Cancel { time }, set]
    }

    /// Forget all automation and jump to `value` (fresh-construction state).
    pub fn reset(&mut self, value: f64) {
        self.initial = value;
        self.events.clear();
    }

    /// Cancel-and-hold at `now`, then ramp to `target` over `duration` seconds.
    /// A non-positive duration sets the value immediately.
    pub fn glide(&mut self, now: f64, target: f64, duration: f64, curve: Curve) -> Vec<Automation> {
        let mut out = self.cancel_and_hold(now);
        if duration <= 0.0 {
            out.push(self.set_value_at(target, now));
            return out;
        }
        let end = now + duration;
        match curve {
            Curve::Linear => out.push(self.linear_ramp_to(target, end)),
            Curve::Exponential => {
                // The held start point must be positive for an exponential segment.
                let start = self.value_at(now);
                if start < MIN_EXP_VALUE {
                    out.push(self.set_value_at(MIN_EXP_VALUE, now));
                }
                out.push(self.exponential_ramp_to(target, end));
            }
        }
        out
    }

    pub fn value_at(&self, t: f64) -> f64 {
        let mut prev_t = 0.0;
        let mut prev_v = self.initial;
        for ev in &self.events {
            let et = ev.time();
            let Some(ev_v) = ev.value() else { continue };
            if t < et {
                return match ev {
                    Automation::SetValue { .. } | Automation::Cancel { .. } => prev_v,
                    Automation::LinearRamp { .. } => {
                        let span = et - prev_t;
                        if span <= 0.0 {
                            ev_v
                        } else {
                            let frac = ((t - prev_t) / span).clamp(0.0, 1.0);
                            prev_v + (ev_v - prev_v) * frac
                        }
                    }
                    Automation::ExponentialRamp { .. } => {
                        let span = et - prev_t;
                        if span <= 0.0 {
                            ev_v
                        } else if prev_v <= 0.0 || ev_v <= 0.0 {
                            prev_v
                        } else {
                            let frac = ((t - prev_t) / span).clamp(0.0, 1.0);
                            prev_v * (ev_v / prev_v).powf(frac)
                        }
                    }
                };
            }
            prev_t = et;
            prev_v = ev_v;
        }
        prev_v
    }

    /// Value once every scheduled event has completed.
    pub fn final_value(&self) -> f64 {
        self.events
            .iter()
            .rev()
            .find_map(|e| e.value())
            .unwrap_or(self.initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_glide_interpolates_from_held_value() {
        let mut p = AudioParam::new(1.0);
        p.glide(2.0, 0.0, 2.0, Curve::Linear);
        assert!((p.value_at(1.0) - 1.0).abs() < 1e-9);
        assert!((p.value_at(2.0) - 1.0).abs() < 1e-9);
        assert!((p.value_at(3.0) - 0.5).abs() < 1e-9);
        assert!((p.value_at(4.0) - 0.0).abs() < 1e-9);
        assert!((p.value_at(10.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_mid_ramp_holds_current_value() {
        let mut p = AudioParam::new(0.0);
        p.glide(0.0, 1.0, 1.0, Curve::Linear);
        p.cancel_and_hold(0.25);
        assert!((p.value_at(0.25) - 0.25).abs() < 1e-9);
        assert!((p.value_at(5.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn exponential_glide_is_geometric() {
        let mut p = AudioParam::new(100.0);
        p.glide(0.0, 10_000.0, 1.0, Curve::Exponential);
        assert!((p.value_at(0.5) - 1_000.0).abs() < 1e-6);
        assert!((p.final_value() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn exponential_glide_from_zero_starts_at_floor() {
        let mut p = AudioParam::new(0.0);
        p.glide(0.0, 1.0, 1.0, Curve::Exponential);
        assert!(p.value_at(0.0) >= MIN_EXP_VALUE);
        assert!((p.value_at(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_sets_immediately() {
        let mut p = AudioParam::new(0.2);
        p.glide(1.0, 0.8, 0.0, Curve::Linear);
        assert!((p.value_at(1.0) - 0.8).abs() < 1e-9);
        assert!((p.value_at(0.5) - 0.2).abs() < 1e-9);
    }
}
