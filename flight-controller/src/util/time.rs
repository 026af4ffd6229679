use std::time::Instant;

pub const US_IN_SECOND: f32 = 1_000_000.0_f32;

/// Microsecond timestamps that never go backwards.
pub trait MonotonicClock {
    fn now_us(&self) -> u64;
}

/// Clock backed by `std::time::Instant`, counting from its creation.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

pub fn elapsed_seconds(from_us: u64, to_us: u64) -> f32 {
    to_us.saturating_sub(from_us) as f32 / US_IN_SECOND
}

/// Splits a tick into consecutive laps measured on a monotonic clock.
pub struct StageTimer<'a> {
    clock: Option<&'a dyn MonotonicClock>,
    lap_start_us: u64,
}

impl<'a> StageTimer<'a> {
    /// Timer whose first lap starts at `start_us`. Without a clock every lap
    /// reads zero.
    pub fn start_at(clock: Option<&'a dyn MonotonicClock>, start_us: u64) -> Self {
        StageTimer {
            clock,
            lap_start_us: start_us,
        }
    }

    /// Microseconds since the previous lap, saturated at `u16::MAX`.
    pub fn lap(&mut self) -> u16 {
        let Some(clock) = self.clock else {
            return 0;
        };
        let now_us = clock.now_us();
        let elapsed_us = now_us.saturating_sub(self.lap_start_us);
        self.lap_start_us = now_us;
        u16::try_from(elapsed_us).unwrap_or(u16::MAX)
    }
}
