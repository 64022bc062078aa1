use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::ShutdownWindow;

/// What [`ShutdownPolicy::evaluate`] decided for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Nothing to do.
    None,

    /// GPU just went idle inside the window; suspend is now planned.
    Armed(DateTime<Local>),

    /// Suspend already planned, still waiting for the idle time to elapse.
    Waiting(DateTime<Local>),

    /// A planned suspend was called off: GPU busy again, or the time left
    /// the window.
    Aborted,

    /// The GPU has been idle long enough; suspend the machine now.
    Suspend,
}

/// Idle-window suspend state machine.
///
/// Two states: inactive (no suspend planned) and pending (suspend planned
/// for a fixed future instant). Driven once per poll tick with the current
/// GPU utilization and wall-clock time. Evaluation never fails; the window
/// is validated at construction time.
pub struct ShutdownPolicy {
    window: ShutdownWindow,
    pending: Option<DateTime<Local>>,
}

impl ShutdownPolicy {
    pub fn new(window: ShutdownWindow) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Planned suspend instant, if one is armed.
    pub fn planned(&self) -> Option<DateTime<Local>> {
        self.pending
    }

    /// Advance the state machine by one tick.
    pub fn evaluate(&mut self, gpu_util: u32, now: DateTime<Local>) -> PolicyDecision {
        if gpu_util > self.window.idle_percent {
            debug!("no suspend, gpu busy");
            return self.abort("GPU busy again, suspend aborted");
        }

        // Window membership keeps the boundary semantics of the original
        // tool: a same-day window excludes its endpoints, a window wrapping
        // midnight includes them.
        let time = now.time();
        let window = &self.window;
        if window.start < window.end && !(window.start < time && time < window.end) {
            debug!("no suspend, outside window");
            return self.abort("time now outside suspend window, suspend aborted");
        } else if window.start > window.end && (time < window.start && time > window.end) {
            debug!("no suspend, outside wrapped window");
            return self.abort("time now outside suspend window, suspend aborted");
        }

        // In the window and the GPU is not busy
        match self.pending {
            None => {
                let planned = now + self.window.idle_duration();
                self.pending = Some(planned);
                info!(
                    "GPU idle, will suspend at {} if this persists",
                    planned.format("%H:%M:%S")
                );
                PolicyDecision::Armed(planned)
            }
            Some(planned) if now < planned => {
                debug!("no suspend yet, {}s left", (planned - now).num_seconds());
                PolicyDecision::Waiting(planned)
            }
            Some(_) => {
                warn!("GPU idle long enough, suspending now");
                // Re-arm from scratch on the next idle episode after resume
                self.pending = None;
                PolicyDecision::Suspend
            }
        }
    }

    fn abort(&mut self, reason: &str) -> PolicyDecision {
        if self.pending.take().is_some() {
            info!("{}", reason);
            PolicyDecision::Aborted
        } else {
            PolicyDecision::None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn window(arg: &str) -> ShutdownWindow {
        arg.parse().unwrap()
    }

    fn night_policy() -> ShutdownPolicy {
        ShutdownPolicy::new(window("1:30-9:00,30,10"))
    }

    fn at(hour: u32, min: u32) -> DateTime<Local> {
        at_sec(hour, min, 0)
    }

    fn at_sec(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, hour, min, sec).unwrap()
    }

    #[test]
    fn busy_gpu_stays_inactive() {
        let mut policy = night_policy();
        assert_eq!(policy.evaluate(50, at(2, 0)), PolicyDecision::None);
        assert_eq!(policy.planned(), None);
    }

    #[test]
    fn busy_gpu_clears_pending_regardless_of_time() {
        // Arm first, then turn busy both inside and outside the window
        let mut policy = night_policy();
        policy.evaluate(5, at(2, 0));
        assert_eq!(policy.evaluate(50, at(2, 10)), PolicyDecision::Aborted);
        assert_eq!(policy.planned(), None);

        policy.evaluate(5, at(2, 0));
        assert_eq!(policy.evaluate(50, at(12, 0)), PolicyDecision::Aborted);
        assert_eq!(policy.planned(), None);
    }

    #[test]
    fn idle_inside_window_arms_the_timer() {
        let mut policy = night_policy();
        assert_eq!(policy.evaluate(5, at(2, 0)), PolicyDecision::Armed(at(2, 30)));
        assert_eq!(policy.planned(), Some(at(2, 30)));
    }

    #[test]
    fn pending_is_idempotent_before_the_planned_time() {
        let mut policy = night_policy();
        policy.evaluate(5, at(2, 0));

        for _ in 0..3 {
            assert_eq!(
                policy.evaluate(5, at(2, 20)),
                PolicyDecision::Waiting(at(2, 30))
            );
            assert_eq!(policy.planned(), Some(at(2, 30)));
        }
    }

    #[test]
    fn fires_once_the_planned_time_passes() {
        let mut policy = night_policy();
        policy.evaluate(5, at(2, 0));
        assert_eq!(policy.evaluate(5, at(2, 35)), PolicyDecision::Suspend);
    }

    #[test]
    fn fires_exactly_at_the_planned_time() {
        let mut policy = night_policy();
        policy.evaluate(5, at(2, 0));
        assert_eq!(policy.evaluate(5, at(2, 30)), PolicyDecision::Suspend);
    }

    #[test]
    fn resets_to_inactive_after_firing() {
        let mut policy = night_policy();
        policy.evaluate(5, at(2, 0));
        policy.evaluate(5, at(2, 35));
        assert_eq!(policy.planned(), None);

        // The next idle tick starts a fresh episode instead of re-firing
        assert_eq!(
            policy.evaluate(5, at(2, 36)),
            PolicyDecision::Armed(at(3, 6))
        );
    }

    #[test]
    fn idle_outside_window_stays_inactive() {
        let mut policy = night_policy();
        assert_eq!(policy.evaluate(5, at(12, 0)), PolicyDecision::None);
        assert_eq!(policy.planned(), None);
    }

    #[test]
    fn leaving_the_window_aborts_a_pending_suspend() {
        let mut policy = night_policy();
        policy.evaluate(5, at(8, 45));
        assert_eq!(policy.evaluate(5, at(9, 10)), PolicyDecision::Aborted);
        assert_eq!(policy.planned(), None);
    }

    #[test]
    fn same_day_window_excludes_its_endpoints() {
        let mut policy = night_policy();
        assert_eq!(policy.evaluate(5, at(1, 30)), PolicyDecision::None);
        assert_eq!(policy.evaluate(5, at(9, 0)), PolicyDecision::None);
        assert_eq!(policy.evaluate(5, at_sec(1, 30, 1)), PolicyDecision::Armed(at_sec(2, 0, 1)));
    }

    #[test]
    fn wrapped_window_covers_both_sides_of_midnight() {
        let mut policy = ShutdownPolicy::new(window("22:00-6:00,30,10"));
        assert_eq!(
            policy.evaluate(5, at(23, 0)),
            PolicyDecision::Armed(at(23, 30))
        );

        let mut policy = ShutdownPolicy::new(window("22:00-6:00,30,10"));
        assert_eq!(policy.evaluate(5, at(5, 0)), PolicyDecision::Armed(at(5, 30)));

        let mut policy = ShutdownPolicy::new(window("22:00-6:00,30,10"));
        assert_eq!(policy.evaluate(5, at(12, 0)), PolicyDecision::None);
    }

    #[test]
    fn wrapped_window_includes_its_endpoints() {
        let mut policy = ShutdownPolicy::new(window("22:00-6:00,30,10"));
        assert_eq!(
            policy.evaluate(5, at(22, 0)),
            PolicyDecision::Armed(at(22, 30))
        );

        let mut policy = ShutdownPolicy::new(window("22:00-6:00,30,10"));
        assert_eq!(policy.evaluate(5, at(6, 0)), PolicyDecision::Armed(at(6, 30)));
    }

    #[test]
    fn equal_start_and_end_means_always_armed() {
        // Neither window test matches, so every time of day counts as inside
        let mut policy = ShutdownPolicy::new(window("9:00-9:00,30,10"));
        assert_eq!(
            policy.evaluate(5, at(15, 0)),
            PolicyDecision::Armed(at(15, 30))
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        // Usage equal to the threshold still counts as idle
        let mut policy = night_policy();
        assert_eq!(policy.evaluate(10, at(2, 0)), PolicyDecision::Armed(at(2, 30)));
    }
}
