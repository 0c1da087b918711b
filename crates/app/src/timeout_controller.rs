//! Occupied → unoccupied transitions with a cool-down.
//!
//! The controller owns the published state of one room and at most one
//! pending timeout. It is purely synchronous: the caller passes the current
//! instant in and sleeps until [`TimeoutController::pending`] itself.
//!
//! Every armed timeout carries a generation number. Arming again or
//! cancelling bumps the generation, so an expiry that was already in flight
//! when the timeout was replaced is recognised as stale and ignored.

use std::time::Duration;

use tokio::time::Instant;

use roomsense_domain::occupancy::OccupancyState;

/// Stand-in delay when `now + timeout` cannot be represented.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A scheduled switch to unoccupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimeout {
    pub generation: u64,
    pub deadline: Instant,
}

/// Debounces the release of an occupied room.
#[derive(Debug)]
pub struct TimeoutController {
    timeout: Duration,
    published: OccupancyState,
    pending: Option<PendingTimeout>,
    next_generation: u64,
}

impl TimeoutController {
    /// A controller for a room that starts unoccupied with nothing pending.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            published: OccupancyState::Unoccupied,
            pending: None,
            next_generation: 0,
        }
    }

    /// The last state handed out for publishing.
    #[must_use]
    pub fn state(&self) -> OccupancyState {
        self.published
    }

    #[must_use]
    pub fn pending(&self) -> Option<PendingTimeout> {
        self.pending
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Feed the outcome of one evaluation taken at `now`.
    ///
    /// Returns the state to publish, if it changed:
    /// - active while unoccupied: switch to occupied at once;
    /// - active while occupied: cancel any pending timeout;
    /// - inactive while occupied: (re)arm the timeout from `now`;
    /// - inactive while unoccupied: nothing.
    pub fn on_evaluation(&mut self, occupied: bool, now: Instant) -> Option<OccupancyState> {
        match (occupied, self.published) {
            (true, OccupancyState::Unoccupied) => {
                self.cancel();
                self.published = OccupancyState::Occupied;
                Some(OccupancyState::Occupied)
            }
            (true, OccupancyState::Occupied) => {
                self.cancel();
                None
            }
            (false, OccupancyState::Occupied) => {
                self.arm(now);
                None
            }
            (false, OccupancyState::Unoccupied) => None,
        }
    }

    /// Replace any pending timeout with one expiring `timeout` after `now`.
    ///
    /// A deadline past the clock's range is clamped to a far-future one.
    pub fn arm(&mut self, now: Instant) -> PendingTimeout {
        let deadline = now
            .checked_add(self.timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let pending = PendingTimeout {
            generation: self.bump(),
            deadline,
        };
        self.pending = Some(pending);
        pending
    }

    /// Drop the pending timeout. Does nothing when none is armed.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.bump();
        }
    }

    /// Handle the expiry of the timeout armed with `generation`.
    ///
    /// Returns [`OccupancyState::Unoccupied`] when that timeout is still the
    /// pending one. Stale generations are ignored. The switch does not look
    /// at entity values again: an expiry always releases the room.
    pub fn on_expiry(&mut self, generation: u64) -> Option<OccupancyState> {
        match self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                self.published = OccupancyState::Unoccupied;
                Some(OccupancyState::Unoccupied)
            }
            _ => None,
        }
    }

    /// Forget everything: unoccupied, nothing pending, new timeout.
    pub fn reset(&mut self, timeout: Duration) {
        self.cancel();
        self.timeout = timeout;
        self.published = OccupancyState::Unoccupied;
    }

    fn bump(&mut self) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        self.next_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn secs(start: Instant, s: u64) -> Instant {
        start + Duration::from_secs(s)
    }

    fn occupied_controller(now: Instant) -> TimeoutController {
        let mut controller = TimeoutController::new(TIMEOUT);
        assert_eq!(
            controller.on_evaluation(true, now),
            Some(OccupancyState::Occupied)
        );
        controller
    }

    #[test]
    fn should_start_unoccupied_and_idle() {
        let controller = TimeoutController::new(TIMEOUT);
        assert_eq!(controller.state(), OccupancyState::Unoccupied);
        assert!(!controller.is_armed());
    }

    #[test]
    fn should_occupy_immediately_on_activity() {
        let start = Instant::now();
        let controller = occupied_controller(start);
        assert_eq!(controller.state(), OccupancyState::Occupied);
        assert!(!controller.is_armed());
    }

    #[test]
    fn should_ignore_inactivity_while_unoccupied() {
        let mut controller = TimeoutController::new(TIMEOUT);
        assert_eq!(controller.on_evaluation(false, Instant::now()), None);
        assert!(!controller.is_armed());
    }

    #[test]
    fn should_not_republish_repeated_activity() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);
        assert_eq!(controller.on_evaluation(true, secs(start, 1)), None);
    }

    #[test]
    fn should_arm_timeout_on_inactivity_while_occupied() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);

        assert_eq!(controller.on_evaluation(false, secs(start, 3)), None);

        let pending = controller.pending().unwrap();
        assert_eq!(pending.deadline, secs(start, 8));
        assert_eq!(controller.state(), OccupancyState::Occupied);
    }

    #[test]
    fn should_release_when_armed_timeout_expires() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);
        let pending = controller.arm(start);

        assert_eq!(
            controller.on_expiry(pending.generation),
            Some(OccupancyState::Unoccupied)
        );
        assert_eq!(controller.state(), OccupancyState::Unoccupied);
        assert!(!controller.is_armed());
    }

    #[test]
    fn should_extend_deadline_on_every_inactive_evaluation() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);

        controller.on_evaluation(false, start);
        let first = controller.pending().unwrap();
        controller.on_evaluation(false, secs(start, 2));
        let second = controller.pending().unwrap();

        assert_eq!(second.deadline, secs(start, 7));
        assert_eq!(controller.on_expiry(first.generation), None);
        assert_eq!(controller.state(), OccupancyState::Occupied);
        assert_eq!(
            controller.on_expiry(second.generation),
            Some(OccupancyState::Unoccupied)
        );
    }

    #[test]
    fn should_cancel_timeout_when_activity_returns() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);
        controller.on_evaluation(false, secs(start, 1));
        let pending = controller.pending().unwrap();

        assert_eq!(controller.on_evaluation(true, secs(start, 2)), None);

        assert!(!controller.is_armed());
        assert_eq!(controller.on_expiry(pending.generation), None);
        assert_eq!(controller.state(), OccupancyState::Occupied);
    }

    #[test]
    fn should_tolerate_cancel_without_pending_timeout() {
        let mut controller = TimeoutController::new(TIMEOUT);
        controller.cancel();
        controller.cancel();
        assert!(!controller.is_armed());
    }

    #[test]
    fn should_ignore_expiry_without_pending_timeout() {
        let mut controller = TimeoutController::new(TIMEOUT);
        assert_eq!(controller.on_expiry(1), None);
        assert_eq!(controller.state(), OccupancyState::Unoccupied);
    }

    #[test]
    fn should_hand_out_fresh_generation_for_each_arm() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);
        let a = controller.arm(start);
        controller.cancel();
        let b = controller.arm(start);
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    fn should_reset_to_unoccupied_with_new_timeout() {
        let start = Instant::now();
        let mut controller = occupied_controller(start);
        controller.arm(start);

        controller.reset(Duration::from_secs(60));

        assert_eq!(controller.state(), OccupancyState::Unoccupied);
        assert!(!controller.is_armed());
        assert_eq!(controller.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn should_clamp_deadline_of_oversized_timeout() {
        let start = Instant::now();
        let mut controller = TimeoutController::new(Duration::from_secs(u64::MAX));
        controller.on_evaluation(true, start);

        assert_eq!(controller.on_evaluation(false, start), None);

        let pending = controller.pending().unwrap();
        assert!(pending.deadline >= start + Duration::from_secs(86_400 * 365));
        assert_eq!(controller.state(), OccupancyState::Occupied);
    }
}
