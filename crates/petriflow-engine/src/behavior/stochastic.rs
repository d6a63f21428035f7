use super::{transfer, BehaviorEnv, FireOutcome, ScheduleState, TransitionBehavior};
use petriflow_core::{NetView, ResolvedArc, Result, TransitionKind, TOKEN_EPSILON};

/// Fires after an exponentially distributed sojourn
///
/// The rate is evaluated when the transition becomes enabled. Every
/// enablement draws a fresh sojourn, so nothing carries over from a previous
/// enabled period. Source transitions also draw a burst size and produce
/// `burst × weight` tokens per output arc when they fire.
#[derive(Debug)]
pub struct StochasticBehavior {
    source: bool,
    max_burst: u32,
    sample: Option<Sample>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    enabled_at: f64,
    sojourn: f64,
    burst: u32,
}

impl Sample {
    fn fire_at(&self) -> f64 {
        self.enabled_at + self.sojourn
    }
}

impl StochasticBehavior {
    pub fn new(source: bool, max_burst: u32) -> Self {
        Self {
            source,
            max_burst: max_burst.max(1),
            sample: None,
        }
    }

    /// Re-anchor the current sample at `time`, drawing one if none exists
    pub fn set_enablement_time(&mut self, time: f64, env: &mut BehaviorEnv<'_>) -> Result<()> {
        match self.sample.as_mut() {
            Some(sample) => {
                sample.enabled_at = time;
                Ok(())
            }
            None => self.draw(time, env),
        }
    }

    /// Burst size of the current sample
    pub fn burst(&self) -> Option<u32> {
        self.sample.map(|s| s.burst)
    }

    fn draw(&mut self, now: f64, env: &mut BehaviorEnv<'_>) -> Result<()> {
        let rate = env.eval_rate(now)?;
        let sojourn = env.rng.exponential(rate);
        let burst = if self.source {
            env.rng.range_u32(1, self.max_burst)
        } else {
            1
        };
        tracing::trace!(transition = %env.transition, rate, sojourn, burst, "sampled sojourn");
        self.sample = Some(Sample {
            enabled_at: now,
            sojourn,
            burst,
        });
        Ok(())
    }
}

impl TransitionBehavior for StochasticBehavior {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Stochastic
    }

    fn can_fire(&self, now: f64) -> (bool, String) {
        let sample = match self.sample {
            Some(sample) => sample,
            None => return (false, "no sojourn sampled".to_string()),
        };
        let fire_at = sample.fire_at();
        if !fire_at.is_finite() {
            return (false, "rate is not positive, no firing scheduled".to_string());
        }
        if now + TOKEN_EPSILON >= fire_at {
            (true, format!("sojourn elapsed at t={}", fire_at))
        } else {
            (false, format!("scheduled to fire at t={}", fire_at))
        }
    }

    fn fire(
        &mut self,
        net: &mut dyn NetView,
        inputs: &[ResolvedArc],
        outputs: &[ResolvedArc],
    ) -> Result<FireOutcome> {
        let multiplier = match (self.source, self.sample) {
            (true, Some(sample)) => sample.burst as f64,
            _ => 1.0,
        };
        transfer(net, inputs, outputs, multiplier)
    }

    fn on_enabled(&mut self, now: f64, env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.draw(now, env)
    }

    fn on_disabled(&mut self) {
        self.sample = None;
    }

    fn on_fired(&mut self, now: f64, env: &mut BehaviorEnv<'_>) -> Result<()> {
        self.draw(now, env)
    }

    fn next_due(&self) -> Option<f64> {
        self.sample
            .map(|s| s.fire_at())
            .filter(|t| t.is_finite())
    }

    fn schedule(&self) -> ScheduleState {
        match self.sample {
            Some(sample) => ScheduleState::Sampled {
                enabled_at: sample.enabled_at,
                fire_at: sample.fire_at(),
                burst: sample.burst,
            },
            None => ScheduleState::Idle,
        }
    }

    fn reset(&mut self) {
        self.sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::EnvParts;
    use super::*;
    use petriflow_core::{Arc, Net, Place, Transition, TransitionId};

    fn source_net() -> Net {
        let mut net = Net::new();
        net.add_place(Place::new("P1", 0.0)).unwrap();
        net.add_transition(Transition::stochastic("T1", 1.0).as_source())
            .unwrap();
        net.add_arc(Arc::new("A1", "T1", "P1")).unwrap();
        net
    }

    #[test]
    fn test_source_fires_after_enablement() {
        let mut net = source_net();
        let t1 = TransitionId::new("T1");
        let outputs = net.output_arcs(&t1).unwrap();
        let mut parts = EnvParts::new(1.0, 42);
        let mut behavior = StochasticBehavior::new(true, 1);

        behavior.set_enablement_time(0.0, &mut parts.env()).unwrap();
        let (ok, reason) = behavior.can_fire(10.0);
        assert!(ok, "{}", reason);

        let outcome = behavior.fire(&mut net, &[], &outputs).unwrap();
        assert!(outcome.fired);
        assert_eq!(net.marking(), vec![1.0]);
    }

    #[test]
    fn test_reenabling_resamples() {
        let mut parts = EnvParts::new(1.0, 7);
        let mut behavior = StochasticBehavior::new(false, 1);
        behavior.on_enabled(0.0, &mut parts.env()).unwrap();
        let stale = behavior.next_due().unwrap();
        assert!(behavior.can_fire(stale).0);

        behavior.on_disabled();
        assert_eq!(behavior.schedule(), ScheduleState::Idle);

        // re-enabled after the stale firing time has passed
        let later = stale + 1.0;
        behavior.on_enabled(later, &mut parts.env()).unwrap();
        let (ok, reason) = behavior.can_fire(later);
        assert!(!ok, "{}", reason);
        let fresh = behavior.next_due().unwrap();
        assert!(fresh > later);
        assert!(behavior.can_fire(fresh).0);
    }

    #[test]
    fn test_set_enablement_time_keeps_sojourn() {
        let mut parts = EnvParts::new(2.0, 3);
        let mut behavior = StochasticBehavior::new(false, 1);
        behavior.on_enabled(0.0, &mut parts.env()).unwrap();
        let sojourn = behavior.next_due().unwrap();

        behavior.set_enablement_time(5.0, &mut parts.env()).unwrap();
        let due = behavior.next_due().unwrap();
        assert!((due - (5.0 + sojourn)).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_rate_never_fires() {
        let mut parts = EnvParts::new(0.0, 3);
        let mut behavior = StochasticBehavior::new(false, 1);
        behavior.on_enabled(0.0, &mut parts.env()).unwrap();
        let (ok, reason) = behavior.can_fire(1e12);
        assert!(!ok);
        assert!(reason.contains("not positive"));
        assert_eq!(behavior.next_due(), None);
    }

    #[test]
    fn test_burst_scales_production() {
        let mut net = source_net();
        let outputs = net.output_arcs(&TransitionId::new("T1")).unwrap();
        let mut parts = EnvParts::new(1.0, 11);
        let mut behavior = StochasticBehavior::new(true, 4);

        let mut total = 0.0;
        for i in 0..20 {
            behavior.on_fired(i as f64, &mut parts.env()).unwrap();
            let burst = behavior.burst().unwrap();
            assert!((1..=4).contains(&burst));
            behavior.fire(&mut net, &[], &outputs).unwrap();
            total += burst as f64;
        }
        assert_eq!(net.marking(), vec![total]);
    }
}
