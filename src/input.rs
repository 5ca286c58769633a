//! Per-frame controller intent.
//!
//! The same shape human-controller polling produces, so combat code downstream
//! does not care whether a fighter is driven by a pad or by the opponent AI.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Light,
    Heavy,
    Grab,
    Dash,
    Dance,
    Dodge,
    Ultimate,
}

pub const BUTTON_COUNT: usize = 7;

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Light,
        Button::Heavy,
        Button::Grab,
        Button::Dash,
        Button::Dance,
        Button::Dodge,
        Button::Ultimate,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Edge flags for one button on one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub down: bool, // pressed this frame, not last
    pub held: bool, // pressed this frame
    pub up: bool,   // released this frame
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputIntent {
    /// Horizontal axis in `-1.0..=1.0`.
    pub axis_x: f64,
    pub jump: bool,
    buttons: [ButtonState; BUTTON_COUNT],
}

impl InputIntent {
    pub fn button(&self, b: Button) -> ButtonState {
        self.buttons[b.index()]
    }

    /// Rising edge for `b`.
    pub fn pressed(&self, b: Button) -> bool {
        self.buttons[b.index()].down
    }

    pub fn held(&self, b: Button) -> bool {
        self.buttons[b.index()].held
    }

    pub fn released(&self, b: Button) -> bool {
        self.buttons[b.index()].up
    }

    pub fn any_pressed(&self) -> bool {
        self.buttons.iter().any(|s| s.down)
    }
}

/// Turns per-frame "buttons currently held" into down/held/up edges.
#[derive(Clone, Debug, Default)]
pub struct ButtonTracker {
    held: [bool; BUTTON_COUNT],
}

impl ButtonTracker {
    pub fn frame(&mut self, axis_x: f64, jump: bool, held_now: &[Button]) -> InputIntent {
        let mut now = [false; BUTTON_COUNT];
        for b in held_now {
            now[b.index()] = true;
        }
        let mut buttons = [ButtonState::default(); BUTTON_COUNT];
        for ((state, &is), &was) in buttons.iter_mut().zip(&now).zip(&self.held) {
            *state = ButtonState {
                down: is && !was,
                held: is,
                up: !is && was,
            };
        }
        self.held = now;
        InputIntent {
            axis_x: if axis_x.is_finite() { axis_x.clamp(-1.0, 1.0) } else { 0.0 },
            jump,
            buttons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_tap_produces_two_rising_edges() {
        let mut t = ButtonTracker::default();
        let a = t.frame(1.0, false, &[Button::Dash]);
        let b = t.frame(1.0, false, &[]);
        let c = t.frame(1.0, false, &[Button::Dash]);
        assert!(a.pressed(Button::Dash) && a.held(Button::Dash));
        assert!(b.released(Button::Dash) && !b.held(Button::Dash));
        assert!(c.pressed(Button::Dash));
        assert!(!c.pressed(Button::Light));
    }

    #[test]
    fn holding_is_not_a_new_press() {
        let mut t = ButtonTracker::default();
        t.frame(0.0, false, &[Button::Heavy]);
        let held = t.frame(2.0, true, &[Button::Heavy]);
        assert!(!held.pressed(Button::Heavy));
        assert!(held.held(Button::Heavy));
        assert_eq!(held.axis_x, 1.0);
        assert!(held.jump);
    }
}
