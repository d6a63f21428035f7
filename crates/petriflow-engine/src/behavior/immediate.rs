use super::{transfer, BehaviorEnv, FireOutcome, ScheduleState, TransitionBehavior};
use petriflow_core::{NetView, ResolvedArc, Result, TransitionKind};

/// Fires as soon as its input arcs are satisfied, without advancing time
#[derive(Debug, Default)]
pub struct ImmediateBehavior {
    enabled_at: Option<f64>,
}

impl ImmediateBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransitionBehavior for ImmediateBehavior {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Immediate
    }

    fn can_fire(&self, _now: f64) -> (bool, String) {
        match self.enabled_at {
            Some(enabled_at) => (true, format!("enabled since t={}", enabled_at)),
            None => (false, "immediate transition is not armed".to_string()),
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
        self.enabled_at = Some(now);
        Ok(())
    }

    fn on_disabled(&mut self) {
        self.enabled_at = None;
    }

    fn on_fired(&mut self, now: f64, _env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.enabled_at = Some(now);
        Ok(())
    }

    fn next_due(&self) -> Option<f64> {
        self.enabled_at
    }

    fn schedule(&self) -> ScheduleState {
        match self.enabled_at {
            Some(enabled_at) => ScheduleState::Ready { enabled_at },
            None => ScheduleState::Idle,
        }
    }

    fn reset(&mut self) {
        self.enabled_at = None;
    }
}
