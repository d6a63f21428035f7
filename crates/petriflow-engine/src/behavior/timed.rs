use super::{transfer, BehaviorEnv, FireOutcome, ScheduleState, TransitionBehavior};
use petriflow_core::{NetView, ResolvedArc, Result, TransitionKind, TOKEN_EPSILON};

/// Fires inside `[t0 + earliest, t0 + latest]` after becoming enabled at `t0`
///
/// Once the window has elapsed the transition stays blocked until it is
/// disabled and enabled again.
#[derive(Debug)]
pub struct TimedBehavior {
    earliest: f64,
    latest: Option<f64>,
    armed: Option<Window>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    enabled_at: f64,
    due_at: f64,
    end: Option<f64>,
}

impl TimedBehavior {
    pub fn new(earliest: f64, latest: Option<f64>) -> Self {
        Self {
            earliest,
            latest,
            armed: None,
        }
    }

    fn arm(&mut self, now: f64) {
        self.armed = Some(Window {
            enabled_at: now,
            due_at: now + self.earliest,
            end: self.latest.map(|latest| now + latest),
        });
    }
}

impl TransitionBehavior for TimedBehavior {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Timed
    }

    fn can_fire(&self, now: f64) -> (bool, String) {
        let window = match self.armed {
            Some(window) => window,
            None => return (false, "timed transition is not armed".to_string()),
        };
        if let Some(end) = window.end {
            if now > end + TOKEN_EPSILON {
                return (
                    false,
                    format!("firing window [{}, {}] has elapsed", window.due_at, end),
                );
            }
        }
        if now + TOKEN_EPSILON >= window.due_at {
            (true, format!("due since t={}", window.due_at))
        } else {
            (false, format!("due at t={}", window.due_at))
        }
    }

    fn fire(
        &mut self,
        net: &mut dyn NetView,
        inputs: &[ResolvedArc],
        outputs: &[ResolvedArc],
    ) -> Result<FireOutcome> {
        transfer(net, inputs, outputs, 1.0)
    }

    fn on_enabled(&mut self, now: f64, _env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.arm(now);
        Ok(())
    }

    fn on_disabled(&mut self) {
        self.armed = None;
    }

    fn on_fired(&mut self, now: f64, _env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.arm(now);
        Ok(())
    }

    fn next_due(&self) -> Option<f64> {
        self.armed.map(|window| window.due_at)
    }

    fn schedule(&self) -> ScheduleState {
        match self.armed {
            Some(window) => ScheduleState::Armed {
                enabled_at: window.enabled_at,
                due_at: window.due_at,
                window_end: window.end,
            },
            None => ScheduleState::Idle,
        }
    }

    fn reset(&mut self) {
        self.armed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::EnvParts;
    use super::*;

    #[test]
    fn test_due_after_earliest_delay() {
        let mut parts = EnvParts::new(1.0, 1);
        let mut behavior = TimedBehavior::new(2.0, None);
        assert!(!behavior.can_fire(5.0).0);

        behavior.on_enabled(1.0, &mut parts.env()).unwrap();
        let (ok, reason) = behavior.can_fire(2.5);
        assert!(!ok);
        assert_eq!(reason, "due at t=3");
        assert!(behavior.can_fire(3.0).0);
        assert_eq!(behavior.next_due(), Some(3.0));
    }

    #[test]
    fn test_elapsed_window_blocks_until_reenabled() {
        let mut parts = EnvParts::new(1.0, 1);
        let mut behavior = TimedBehavior::new(1.0, Some(2.0));
        behavior.on_enabled(0.0, &mut parts.env()).unwrap();
        assert!(behavior.can_fire(1.5).0);

        let (ok, reason) = behavior.can_fire(3.0);
        assert!(!ok);
        assert!(reason.contains("elapsed"), "{}", reason);

        behavior.on_disabled();
        behavior.on_enabled(3.0, &mut parts.env()).unwrap();
        assert!(behavior.can_fire(4.0).0);
    }

    #[test]
    fn test_firing_rearms_from_firing_time() {
        let mut parts = EnvParts::new(1.0, 1);
        let mut behavior = TimedBehavior::new(2.0, None);
        behavior.on_enabled(0.0, &mut parts.env()).unwrap();
        behavior.on_fired(2.0, &mut parts.env()).unwrap();
        assert_eq!(
            behavior.schedule(),
            ScheduleState::Armed {
                enabled_at: 2.0,
                due_at: 4.0,
                window_end: None
            }
        );
        behavior.reset();
        assert_eq!(behavior.schedule(), ScheduleState::Idle);
    }
}
