// Fixed/variable timestep clock for animation and simulation timing.
//
// Time is carried in a canonical integer tick format (10,000,000 ticks per
// second) so fixed-step accumulation never drifts from float rounding.

use std::time::{Duration, Instant};

pub const TICKS_PER_SECOND: u64 = 10_000_000;

pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

pub fn seconds_to_ticks(seconds: f64) -> u64 {
    (seconds * TICKS_PER_SECOND as f64) as u64
}

#[derive(Debug, Clone)]
pub struct StepTimer {
    last_time: Instant,
    /// Clamp for excessively large deltas (e.g. after sitting in a debugger).
    max_delta_ticks: u64,

    elapsed_ticks: u64,
    total_ticks: u64,
    leftover_ticks: u64,

    frame_count: u32,
    frames_per_second: u32,
    frames_this_second: u32,
    second_counter_ticks: u64,

    fixed_timestep: bool,
    target_elapsed_ticks: u64,
}

impl StepTimer {
    pub fn new() -> Self {
        Self {
            last_time: Instant::now(),
            max_delta_ticks: TICKS_PER_SECOND / 10,
            elapsed_ticks: 0,
            total_ticks: 0,
            leftover_ticks: 0,
            frame_count: 0,
            frames_per_second: 0,
            frames_this_second: 0,
            second_counter_ticks: 0,
            fixed_timestep: false,
            target_elapsed_ticks: TICKS_PER_SECOND / 60,
        }
    }

    /// Elapsed time since the previous `tick`.
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn elapsed_seconds(&self) -> f64 {
        ticks_to_seconds(self.elapsed_ticks)
    }

    /// Total time since the timer was created (or last reset).
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn total_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks)
    }

    /// Number of update calls since the start of the program.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn set_fixed_timestep(&mut self, fixed: bool) {
        self.fixed_timestep = fixed;
    }

    pub fn set_target_elapsed_ticks(&mut self, ticks: u64) {
        self.target_elapsed_ticks = ticks;
    }

    pub fn set_target_elapsed_seconds(&mut self, seconds: f64) {
        self.target_elapsed_ticks = seconds_to_ticks(seconds);
    }

    /// Call after an intentional timing discontinuity (for instance a blocking
    /// IO operation) so fixed-step logic does not attempt a run of catch-up
    /// updates.
    pub fn reset_elapsed_time(&mut self) {
        self.last_time = Instant::now();
        self.leftover_ticks = 0;
        self.frames_per_second = 0;
        self.frames_this_second = 0;
        self.second_counter_ticks = 0;
    }

    /// Update timer state, calling `update` the appropriate number of times.
    pub fn tick<F: FnMut()>(&mut self, update: F) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_time);
        self.last_time = now;
        self.advance(delta, update);
    }

    fn advance<F: FnMut()>(&mut self, delta: Duration, mut update: F) {
        let mut delta_ticks =
            (delta.as_nanos() as u64).saturating_mul(TICKS_PER_SECOND) / 1_000_000_000;
        self.second_counter_ticks += delta_ticks;

        if delta_ticks > self.max_delta_ticks {
            delta_ticks = self.max_delta_ticks;
        }

        let last_frame_count = self.frame_count;

        if self.fixed_timestep {
            // If we are running within 1/4 ms of the target elapsed time, snap
            // to the target. A 60 fps fixed step on a 59.94 Hz vsynced display
            // would otherwise accumulate tiny errors and eventually drop a
            // frame; rounding small deviations to zero keeps things smooth.
            if delta_ticks.abs_diff(self.target_elapsed_ticks) < TICKS_PER_SECOND / 4000 {
                delta_ticks = self.target_elapsed_ticks;
            }

            self.leftover_ticks += delta_ticks;

            while self.leftover_ticks >= self.target_elapsed_ticks {
                self.elapsed_ticks = self.target_elapsed_ticks;
                self.total_ticks += self.target_elapsed_ticks;
                self.leftover_ticks -= self.target_elapsed_ticks;
                self.frame_count += 1;
                update();
            }
        } else {
            self.elapsed_ticks = delta_ticks;
            self.total_ticks += delta_ticks;
            self.leftover_ticks = 0;
            self.frame_count += 1;
            update();
        }

        if self.frame_count != last_frame_count {
            self.frames_this_second += 1;
        }

        if self.second_counter_ticks >= TICKS_PER_SECOND {
            self.frames_per_second = self.frames_this_second;
            self.frames_this_second = 0;
            self.second_counter_ticks %= TICKS_PER_SECOND;
        }
    }
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_duration() -> Duration {
        Duration::from_nanos(1_000_000_000 / 60)
    }

    #[test]
    fn variable_step_passes_delta_through() {
        let mut timer = StepTimer::new();
        let mut updates = 0;
        timer.advance(Duration::from_millis(16), || updates += 1);
        assert_eq!(updates, 1);
        assert_eq!(timer.frame_count(), 1);
        assert_eq!(timer.elapsed_ticks(), 160_000);
        assert_eq!(timer.total_ticks(), 160_000);
    }

    #[test]
    fn fixed_step_runs_catch_up_updates() {
        let mut timer = StepTimer::new();
        timer.set_fixed_timestep(true);
        timer.set_target_elapsed_seconds(1.0 / 60.0);

        // Three targets' worth of wall time in one tick yields three updates.
        let mut updates = 0;
        timer.advance(3 * target_duration(), || updates += 1);
        assert_eq!(updates, 3);
        assert_eq!(timer.frame_count(), 3);
        assert_eq!(timer.elapsed_ticks(), timer.target_elapsed_ticks);
    }

    #[test]
    fn fixed_step_snaps_near_target_deltas() {
        let mut timer = StepTimer::new();
        timer.set_fixed_timestep(true);
        let target = timer.target_elapsed_ticks;

        // 100 us over target is inside the 1/4 ms snap window, so no leftover
        // accumulates.
        let delta = Duration::from_nanos((target + 1000) * 100);
        timer.advance(delta, || {});
        assert_eq!(timer.leftover_ticks, 0);
        assert_eq!(timer.total_ticks(), target);
    }

    #[test]
    fn fixed_step_accumulates_leftover() {
        let mut timer = StepTimer::new();
        timer.set_fixed_timestep(true);
        timer.set_target_elapsed_ticks(100_000);

        let mut updates = 0;
        // 150,000 ticks: one update fires, 50,000 ticks remain.
        timer.advance(Duration::from_millis(15), || updates += 1);
        assert_eq!(updates, 1);
        assert_eq!(timer.leftover_ticks, 50_000);

        // Another 50,000 ticks completes the second step.
        timer.advance(Duration::from_millis(5), || updates += 1);
        assert_eq!(updates, 2);
        assert_eq!(timer.leftover_ticks, 0);
    }

    #[test]
    fn oversized_deltas_are_clamped() {
        let mut timer = StepTimer::new();
        // A full second (paused in a debugger) clamps to 1/10 s.
        timer.advance(Duration::from_secs(1), || {});
        assert_eq!(timer.total_ticks(), TICKS_PER_SECOND / 10);
    }

    #[test]
    fn reset_clears_accumulator() {
        let mut timer = StepTimer::new();
        timer.set_fixed_timestep(true);
        timer.set_target_elapsed_ticks(100_000);
        timer.advance(Duration::from_millis(5), || {});
        assert!(timer.leftover_ticks > 0);

        timer.reset_elapsed_time();
        assert_eq!(timer.leftover_ticks, 0);
        assert_eq!(timer.frames_per_second(), 0);
    }

    #[test]
    fn fps_rolls_over_each_second() {
        let mut timer = StepTimer::new();
        for _ in 0..20 {
            timer.advance(Duration::from_millis(50), || {});
        }
        // 20 ticks of 50 ms cross the one-second boundary exactly once.
        assert_eq!(timer.frames_per_second(), 20);
    }
}
