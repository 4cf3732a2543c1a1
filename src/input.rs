// Rickshaw Passenger Unit — Debounced Button Input
//
// Stable-duration debounce for the ride request button. Polled every loop
// tick; emits at most one edge per physical transition, once the raw level
// has held steady for the full debounce window. Kept free of pin ownership
// so the same state machine runs under test with a synthetic clock.

use crate::config::DEBOUNCE_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

pub struct Debouncer {
    last_raw: bool,
    last_change_ms: u32,
    stable_pressed: bool,
}

impl Debouncer {
    /// `initial_pressed` is the level at boot — `false` for a pull-up
    /// button at rest.
    pub fn new(initial_pressed: bool, now_ms: u32) -> Self {
        Self {
            last_raw: initial_pressed,
            last_change_ms: now_ms,
            stable_pressed: initial_pressed,
        }
    }

    /// Feed one raw sample. Returns an edge only when the debounced level
    /// actually changes. Chatter restarts the stability window, so a
    /// bouncing signal produces nothing until it settles.
    pub fn update(&mut self, raw_pressed: bool, now_ms: u32) -> Option<Edge> {
        if raw_pressed != self.last_raw {
            self.last_change_ms = now_ms;
            self.last_raw = raw_pressed;
        }

        if now_ms.wrapping_sub(self.last_change_ms) < DEBOUNCE_MS {
            return None;
        }

        if raw_pressed != self.stable_pressed {
            self.stable_pressed = raw_pressed;
            return Some(if raw_pressed { Edge::Pressed } else { Edge::Released });
        }

        None
    }

    #[allow(dead_code)]
    pub fn is_pressed(&self) -> bool {
        self.stable_pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_fires_once_after_stability_window() {
        let mut d = Debouncer::new(false, 0);
        assert_eq!(d.update(true, 10), None); // raw change, timer starts
        assert_eq!(d.update(true, 40), None); // 30 ms stable — not enough
        assert_eq!(d.update(true, 60), Some(Edge::Pressed)); // 50 ms stable
        assert_eq!(d.update(true, 100), None); // no repeat while held
    }

    #[test]
    fn chatter_resets_the_stability_timer() {
        let mut d = Debouncer::new(false, 0);
        d.update(true, 0);
        d.update(false, 20); // bounce
        d.update(true, 35); // bounce
        assert_eq!(d.update(true, 80), None); // only 45 ms since last change
        assert_eq!(d.update(true, 85), Some(Edge::Pressed));
    }

    #[test]
    fn release_emits_its_own_edge() {
        let mut d = Debouncer::new(false, 0);
        d.update(true, 0);
        assert_eq!(d.update(true, 50), Some(Edge::Pressed));
        d.update(false, 60);
        assert_eq!(d.update(false, 109), None);
        assert_eq!(d.update(false, 110), Some(Edge::Released));
    }

    #[test]
    fn settled_bounce_back_produces_no_event() {
        // Raw blips to pressed and back faster than the window: no edges.
        let mut d = Debouncer::new(false, 0);
        d.update(true, 0);
        d.update(false, 30);
        assert_eq!(d.update(false, 200), None);
        assert!(!d.is_pressed());
    }
}
