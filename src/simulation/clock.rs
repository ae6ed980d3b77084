use super::pipeline::TICK_SECONDS;

/// Longest frame delta accepted by the accumulator
pub const MAX_FRAME_SECONDS: f64 = 0.25;

/// Fixed-timestep accumulator
///
/// Frame deltas are clamped to [`MAX_FRAME_SECONDS`] so a stalled host never
/// triggers a long burst of catch-up ticks.
#[derive(Debug, Clone, Default)]
pub struct FixedStepClock {
    accumulator: f64,
}

impl FixedStepClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame delta; returns how many ticks are now due
    pub fn advance(&mut self, frame_seconds: f64) -> usize {
        let delta = if frame_seconds.is_finite() {
            frame_seconds.clamp(0.0, MAX_FRAME_SECONDS)
        } else {
            0.0
        };
        self.accumulator += delta;
        let mut ticks = 0;
        // Small tolerance so 0.1 + 0.1 + 0.1 yields three ticks
        while self.accumulator + 1e-9 >= TICK_SECONDS {
            self.accumulator -= TICK_SECONDS;
            ticks += 1;
        }
        self.accumulator = self.accumulator.max(0.0);
        ticks
    }

    /// Drop any partial step, used when the simulation pauses
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Tick count for a deterministic advance of `ms` milliseconds
    pub fn ticks_for_millis(ms: f64) -> usize {
        let steps = (ms.max(0.0) / (TICK_SECONDS * 1000.0)).round();
        (steps as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut clock = FixedStepClock::new();
        assert_eq!(clock.advance(0.05), 0);
        assert_eq!(clock.advance(0.05), 1);
        assert_eq!(clock.advance(0.1), 1);
    }

    #[test]
    fn test_long_frames_are_clamped() {
        let mut clock = FixedStepClock::new();
        assert_eq!(clock.advance(5.0), 2);
        assert_eq!(clock.advance(f64::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
    }

    #[test]
    fn test_ticks_for_millis() {
        assert_eq!(FixedStepClock::ticks_for_millis(0.0), 1);
        assert_eq!(FixedStepClock::ticks_for_millis(1000.0), 10);
        assert_eq!(FixedStepClock::ticks_for_millis(149.0), 1);
        assert_eq!(FixedStepClock::ticks_for_millis(151.0), 2);
    }
}
