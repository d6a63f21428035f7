use super::{BehaviorEnv, FireOutcome, ScheduleState, TransitionBehavior};
use petriflow_core::{NetView, ResolvedArc, Result, TransitionKind};

/// Moves tokens as a flow; the controller integrates it every step
///
/// Continuous transitions never take part in conflict resolution and never
/// fire discretely.
#[derive(Debug, Default)]
pub struct ContinuousBehavior {
    enabled_at: Option<f64>,
}

impl ContinuousBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransitionBehavior for ContinuousBehavior {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Continuous
    }

    fn can_fire(&self, _now: f64) -> (bool, String) {
        match self.enabled_at {
            Some(since) => (true, format!("flowing since t={}", since)),
            None => (false, "continuous transition is not flowing".to_string()),
        }
    }

    fn fire(
        &mut self,
        _net: &mut dyn NetView,
        _inputs: &[ResolvedArc],
        _outputs: &[ResolvedArc],
    ) -> Result<FireOutcome> {
        Ok(FireOutcome::refused(
            "continuous transitions move tokens by flow, not by firing",
        ))
    }

    fn on_enabled(&mut self, now: f64, _env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.enabled_at = Some(now);
        Ok(())
    }

    fn on_disabled(&mut self) {
        self.enabled_at = None;
    }

    fn on_fired(&mut self, _now: f64, _env: &mut BehaviorEnv<'_>) -> Result<()> {
        Ok(())
    }

    fn next_due(&self) -> Option<f64> {
        None
    }

    fn schedule(&self) -> ScheduleState {
        match self.enabled_at {
            Some(enabled_at) => ScheduleState::Flowing { enabled_at },
            None => ScheduleState::Idle,
        }
    }

    fn reset(&mut self) {
        self.enabled_at = None;
    }
}
