//! Photo-eye pulse counting and motor timeout monitoring.
//!
//! Everything in this module runs in interrupt context on real hardware, so
//! it only updates counters and raises [`TaskFlags`]. The heavier work
//! (calibration, persistence) is left to the deferred handlers on
//! [`ValveController`](crate::ValveController).
//!
//! Two producers feed the monitor:
//!
//! - [`PulseMonitor::on_eye_sample`] on every photo-eye pin change
//! - [`PulseMonitor::on_tick`] from the periodic timer while the motor runs
//!
//! # Timing
//!
//! | Window | Ticks | Meaning |
//! |--------|-------|---------|
//! | noise protection | [`NOISE_PROTECTION_TICKS`] | edges ignored after a counted pulse |
//! | per-pulse timeout | `run_timeout << 8` | no pulse within this time: motor stalled |
//! | overrun | [`OVERRUN_TICKS`] | run-on after the target count was reached |

use bitflags::bitflags;
use heapless::HistoryBuffer;

use crate::traits::Direction;

/// Ticks during which photo-eye edges are ignored after a counted pulse.
pub const NOISE_PROTECTION_TICKS: u8 = 5;

/// Ticks the motor keeps running after the stop position was counted.
pub const OVERRUN_TICKS: u16 = 3 * 256;

/// Number of inter-pulse intervals kept for diagnostics.
pub const INTERVAL_HISTORY: usize = 8;

// ============================================================================
// Task flags
// ============================================================================

bitflags! {
    /// Deferred work requested by the interrupt producers.
    ///
    /// The scheduler collects these with
    /// [`ValveController::take_tasks`](crate::ValveController::take_tasks) and
    /// runs the matching handlers outside interrupt context.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TaskFlags: u8 {
        /// A pulse was counted or a timeout fired (diagnostics).
        const PULSE = 1 << 0;
        /// The motor timed out and must be finalized.
        const STOP = 1 << 1;
    }
}

// ============================================================================
// Eye and diagnostic state
// ============================================================================

/// Photo-eye filter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EyeState {
    /// Next rising edge is counted.
    #[default]
    Ready,
    /// Edges are ignored for this many more ticks.
    Debouncing(u8),
    /// The stop position was counted; the overrun timeout decides the stop.
    ///
    /// Not decremented by the tick. Cleared when a direction is engaged.
    AwaitingStop,
}

/// Timing information about the most recent pulse or timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PulseDiagnostic {
    /// Nothing measured since power-up.
    #[default]
    None,
    /// Ticks elapsed between the last two counted pulses.
    Interval(u16),
    /// Overrun timeout expired after the stop position was reached.
    TimeoutAtTarget,
    /// Per-pulse timeout expired before the stop position was reached.
    TimeoutBeforeTarget,
}

/// Result of one timer tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown still running.
    Running,
    /// Countdown reached zero: motor power must be cut now.
    Expired,
}

// ============================================================================
// Pulse monitor
// ============================================================================

/// Interrupt-side state of the valve motor.
///
/// Owns the tracked position, the stop target, the direction used as pulse
/// sign, and both countdown timers.
///
/// # Example
///
/// ```rust
/// use rs_valve::pulse::{EyeState, PulseMonitor, TaskFlags, NOISE_PROTECTION_TICKS};
/// use rs_valve::Direction;
///
/// let mut monitor = PulseMonitor::new();
/// monitor.set_stop_position(10);
/// monitor.arm(Direction::Open, 512);
///
/// // Let the noise window pass, then deliver one rising edge
/// for _ in 0..NOISE_PROTECTION_TICKS {
///     monitor.on_tick();
/// }
/// monitor.on_eye_sample(false);
/// assert!(monitor.on_eye_sample(true));
///
/// assert_eq!(monitor.position(), 1);
/// assert!(monitor.take_tasks().contains(TaskFlags::PULSE));
/// ```
#[derive(Debug)]
pub struct PulseMonitor {
    position: i16,
    stop_position: i16,
    direction: Direction,
    eye: EyeState,
    last_level: bool,
    countdown: u16,
    reload: u16,
    diagnostic: PulseDiagnostic,
    intervals: HistoryBuffer<u16, INTERVAL_HISTORY>,
    tasks: TaskFlags,
}

impl Default for PulseMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseMonitor {
    /// Creates an idle monitor at position 0.
    pub fn new() -> Self {
        Self {
            position: 0,
            stop_position: 0,
            direction: Direction::Stop,
            eye: EyeState::Ready,
            last_level: false,
            countdown: 0,
            reload: 0,
            diagnostic: PulseDiagnostic::None,
            intervals: HistoryBuffer::new(),
            tasks: TaskFlags::empty(),
        }
    }

    /// Start counting in `direction` with a per-pulse timeout of `reload` ticks.
    ///
    /// Opens the noise protection window so that the glitch caused by
    /// powering the photo-eye is not counted.
    pub fn arm(&mut self, direction: Direction, reload: u16) {
        self.reload = reload;
        self.countdown = reload;
        self.eye = EyeState::Debouncing(NOISE_PROTECTION_TICKS);
        self.direction = direction;
    }

    /// Stop counting. The eye state is kept for the deferred stop handler.
    pub fn disarm(&mut self) {
        self.direction = Direction::Stop;
    }

    /// Feed one photo-eye sample. Returns true if a pulse was counted.
    ///
    /// Only a rising edge relative to the previous sample counts, and only
    /// while the eye is [`EyeState::Ready`] and a direction is armed.
    pub fn on_eye_sample(&mut self, level: bool) -> bool {
        let rising = level && !self.last_level;
        self.last_level = level;

        if !rising || self.eye != EyeState::Ready || !self.direction.is_moving() {
            return false;
        }

        self.position = self.position.wrapping_add(self.direction.step());
        let interval = self.reload.saturating_sub(self.countdown);
        self.diagnostic = PulseDiagnostic::Interval(interval);
        self.intervals.write(interval);
        self.tasks.insert(TaskFlags::PULSE);

        if self.position == self.stop_position {
            self.eye = EyeState::AwaitingStop;
            self.countdown = OVERRUN_TICKS;
        } else {
            self.eye = EyeState::Debouncing(NOISE_PROTECTION_TICKS);
            self.countdown = self.reload;
        }
        true
    }

    /// Advance the periodic timer by one tick.
    ///
    /// Keeps reporting [`TickOutcome::Expired`] until the tick is disabled.
    pub fn on_tick(&mut self) -> TickOutcome {
        let outcome = if self.countdown > 0 {
            self.countdown -= 1;
            TickOutcome::Running
        } else {
            self.diagnostic = if self.eye == EyeState::AwaitingStop {
                PulseDiagnostic::TimeoutAtTarget
            } else {
                PulseDiagnostic::TimeoutBeforeTarget
            };
            self.tasks.insert(TaskFlags::STOP | TaskFlags::PULSE);
            TickOutcome::Expired
        };

        if let EyeState::Debouncing(n) = self.eye {
            self.eye = match n {
                0 | 1 => EyeState::Ready,
                n => EyeState::Debouncing(n - 1),
            };
        }

        outcome
    }

    /// Read and clear the pending task flags.
    pub fn take_tasks(&mut self) -> TaskFlags {
        core::mem::take(&mut self.tasks)
    }

    /// Drop any pending task flags.
    pub fn clear_tasks(&mut self) {
        self.tasks = TaskFlags::empty();
    }

    /// Pending task flags without clearing them.
    #[inline]
    pub fn pending_tasks(&self) -> TaskFlags {
        self.tasks
    }

    /// Tracked position in pulses.
    #[inline]
    pub fn position(&self) -> i16 {
        self.position
    }

    /// Overwrite the tracked position.
    #[inline]
    pub fn set_position(&mut self, position: i16) {
        self.position = position;
    }

    /// Pulse count at which the motor stops.
    #[inline]
    pub fn stop_position(&self) -> i16 {
        self.stop_position
    }

    /// Set the pulse count at which the motor stops.
    #[inline]
    pub fn set_stop_position(&mut self, stop_position: i16) {
        self.stop_position = stop_position;
    }

    /// Armed direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Photo-eye filter state.
    #[inline]
    pub fn eye_state(&self) -> EyeState {
        self.eye
    }

    /// Ticks left before the running timeout expires.
    #[inline]
    pub fn countdown(&self) -> u16 {
        self.countdown
    }

    /// Latest pulse or timeout diagnostic.
    #[inline]
    pub fn diagnostic(&self) -> PulseDiagnostic {
        self.diagnostic
    }

    /// Average of the recorded inter-pulse intervals, in ticks.
    pub fn mean_interval(&self) -> Option<u16> {
        let count = self.intervals.len();
        if count == 0 {
            return None;
        }
        let sum: u32 = self.intervals.as_slice().iter().map(|&i| u32::from(i)).sum();
        Some((sum / count as u32) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(direction: Direction, stop: i16) -> PulseMonitor {
        let mut monitor = PulseMonitor::new();
        monitor.set_stop_position(stop);
        monitor.arm(direction, 512);
        for _ in 0..NOISE_PROTECTION_TICKS {
            monitor.on_tick();
        }
        monitor
    }

    fn pulse(monitor: &mut PulseMonitor) -> bool {
        monitor.on_eye_sample(false);
        monitor.on_eye_sample(true)
    }

    fn settle(monitor: &mut PulseMonitor) {
        for _ in 0..NOISE_PROTECTION_TICKS {
            monitor.on_tick();
        }
    }

    // =========================================================================
    // Edge filtering
    // =========================================================================

    #[test]
    fn counts_only_rising_edges() {
        let mut monitor = armed(Direction::Open, 100);
        assert!(monitor.on_eye_sample(true));
        settle(&mut monitor);

        // Level stays high: no new edge
        assert!(!monitor.on_eye_sample(true));
        // Falling edge is ignored
        assert!(!monitor.on_eye_sample(false));
        assert_eq!(monitor.position(), 1);
    }

    #[test]
    fn ignores_edges_inside_noise_window() {
        let mut monitor = armed(Direction::Open, 100);
        assert!(pulse(&mut monitor));
        assert_eq!(
            monitor.eye_state(),
            EyeState::Debouncing(NOISE_PROTECTION_TICKS)
        );

        assert!(!pulse(&mut monitor));
        assert_eq!(monitor.position(), 1);

        settle(&mut monitor);
        assert_eq!(monitor.eye_state(), EyeState::Ready);
        assert!(pulse(&mut monitor));
        assert_eq!(monitor.position(), 2);
    }

    #[test]
    fn arming_opens_noise_window() {
        let mut monitor = PulseMonitor::new();
        monitor.set_stop_position(100);
        monitor.arm(Direction::Open, 512);
        assert!(!pulse(&mut monitor));
        assert_eq!(monitor.position(), 0);
    }

    #[test]
    fn ignores_edges_while_disarmed() {
        let mut monitor = PulseMonitor::new();
        assert!(!pulse(&mut monitor));
        assert!(monitor.take_tasks().is_empty());
    }

    #[test]
    fn close_direction_counts_down() {
        let mut monitor = armed(Direction::Close, -100);
        for _ in 0..3 {
            assert!(pulse(&mut monitor));
            settle(&mut monitor);
        }
        assert_eq!(monitor.position(), -3);
    }

    // =========================================================================
    // Stop position and timeouts
    // =========================================================================

    #[test]
    fn reaching_stop_position_arms_overrun() {
        let mut monitor = armed(Direction::Open, 2);
        assert!(pulse(&mut monitor));
        settle(&mut monitor);
        assert!(pulse(&mut monitor));

        assert_eq!(monitor.position(), 2);
        assert_eq!(monitor.eye_state(), EyeState::AwaitingStop);
        assert_eq!(monitor.countdown(), OVERRUN_TICKS);
        // No stop requested yet
        assert!(!monitor.take_tasks().contains(TaskFlags::STOP));
    }

    #[test]
    fn awaiting_stop_is_not_decremented_and_blocks_pulses() {
        let mut monitor = armed(Direction::Open, 1);
        assert!(pulse(&mut monitor));
        for _ in 0..100 {
            monitor.on_tick();
        }
        assert_eq!(monitor.eye_state(), EyeState::AwaitingStop);
        assert!(!pulse(&mut monitor));
        assert_eq!(monitor.position(), 1);
    }

    #[test]
    fn overrun_expiry_reports_timeout_at_target() {
        let mut monitor = armed(Direction::Open, 1);
        assert!(pulse(&mut monitor));
        monitor.take_tasks();

        for _ in 0..OVERRUN_TICKS {
            assert_eq!(monitor.on_tick(), TickOutcome::Running);
        }
        assert_eq!(monitor.on_tick(), TickOutcome::Expired);
        assert_eq!(monitor.diagnostic(), PulseDiagnostic::TimeoutAtTarget);
        assert_eq!(monitor.take_tasks(), TaskFlags::STOP | TaskFlags::PULSE);
    }

    #[test]
    fn stall_reports_timeout_before_target() {
        let mut monitor = armed(Direction::Close, -50);
        let mut ticks = NOISE_PROTECTION_TICKS as u32;
        while monitor.on_tick() == TickOutcome::Running {
            ticks += 1;
        }
        assert_eq!(ticks, 512);
        assert_eq!(monitor.diagnostic(), PulseDiagnostic::TimeoutBeforeTarget);
        assert!(monitor.take_tasks().contains(TaskFlags::STOP));
    }

    #[test]
    fn pulse_reloads_timeout() {
        let mut monitor = armed(Direction::Open, 100);
        for _ in 0..300 {
            monitor.on_tick();
        }
        assert!(pulse(&mut monitor));
        assert_eq!(monitor.countdown(), 512);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    #[test]
    fn records_interval_since_last_pulse() {
        let mut monitor = armed(Direction::Open, 100);
        for _ in 0..35 {
            monitor.on_tick();
        }
        assert!(pulse(&mut monitor));
        assert_eq!(
            monitor.diagnostic(),
            PulseDiagnostic::Interval(35 + NOISE_PROTECTION_TICKS as u16)
        );
    }

    #[test]
    fn mean_interval_over_history() {
        let mut monitor = armed(Direction::Open, 100);
        assert_eq!(monitor.mean_interval(), None);

        for _ in 0..4 {
            for _ in 0..15 {
                monitor.on_tick();
            }
            assert!(pulse(&mut monitor));
        }
        // First interval includes the initial noise window
        assert_eq!(monitor.mean_interval(), Some((20 + 15 * 3) / 4));
    }

    #[test]
    fn disarm_keeps_eye_state() {
        let mut monitor = armed(Direction::Open, 1);
        assert!(pulse(&mut monitor));
        monitor.disarm();
        assert_eq!(monitor.direction(), Direction::Stop);
        assert_eq!(monitor.eye_state(), EyeState::AwaitingStop);
    }

    #[test]
    fn take_tasks_clears() {
        let mut monitor = armed(Direction::Open, 100);
        assert!(pulse(&mut monitor));
        assert_eq!(monitor.pending_tasks(), TaskFlags::PULSE);
        assert_eq!(monitor.take_tasks(), TaskFlags::PULSE);
        assert!(monitor.take_tasks().is_empty());
    }

    #[test]
    fn task_flag_bits() {
        assert_eq!(TaskFlags::PULSE.bits(), 0b01);
        assert_eq!(TaskFlags::STOP.bits(), 0b10);
        assert_eq!(TaskFlags::all(), TaskFlags::STOP | TaskFlags::PULSE);
        assert_eq!(TaskFlags::from_bits(0b100), None);
    }
}
