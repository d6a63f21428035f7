//! Fixed-step integration of continuous flow
//!
//! All enabled continuous transitions form one ODE system over the marking:
//!
//! ```text
//! dm_p/dt = Σ_t r_t(m, t) · (w_out(t, p) − w_in(p, t))
//! ```
//!
//! Rates are re-evaluated at every stage, so mass-action style rates slow
//! down as their inputs drain. Guard arcs never carry flow.

use crate::{Diagnostic, Error, IntegratorKind, NegativeRatePolicy, Result};
use petriflow_core::{CompiledRate, EvalContext, NoiseBank, ResolvedArc, TransitionId};

/// Right-hand side of an ODE over the marking vector
pub trait FlowSystem {
    /// Write `dm/dt` at `(marking, time)` into `out`
    fn derivative(&mut self, marking: &[f64], time: f64, out: &mut [f64]) -> Result<()>;
}

impl<F> FlowSystem for F
where
    F: FnMut(&[f64], f64, &mut [f64]) -> Result<()>,
{
    fn derivative(&mut self, marking: &[f64], time: f64, out: &mut [f64]) -> Result<()> {
        self(marking, time, out)
    }
}

impl IntegratorKind {
    /// Advance `marking` from `time` to `time + dt`
    pub fn advance<S: FlowSystem + ?Sized>(
        self,
        system: &mut S,
        marking: &mut [f64],
        time: f64,
        dt: f64,
    ) -> Result<()> {
        match self {
            IntegratorKind::RungeKutta4 => rk4_step(system, marking, time, dt),
            IntegratorKind::Euler => euler_step(system, marking, time, dt),
        }
    }
}

/// One forward Euler step
pub fn euler_step<S: FlowSystem + ?Sized>(
    system: &mut S,
    marking: &mut [f64],
    time: f64,
    dt: f64,
) -> Result<()> {
    let mut k = vec![0.0; marking.len()];
    system.derivative(marking, time, &mut k)?;
    for (m, d) in marking.iter_mut().zip(&k) {
        *m += dt * d;
    }
    Ok(())
}

/// One classic 4th-order Runge-Kutta step
pub fn rk4_step<S: FlowSystem + ?Sized>(
    system: &mut S,
    marking: &mut [f64],
    time: f64,
    dt: f64,
) -> Result<()> {
    let n = marking.len();
    let half = dt / 2.0;
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut stage = vec![0.0; n];

    system.derivative(marking, time, &mut k1)?;

    offset(&mut stage, marking, &k1, half);
    system.derivative(&stage, time + half, &mut k2)?;

    offset(&mut stage, marking, &k2, half);
    system.derivative(&stage, time + half, &mut k3)?;

    offset(&mut stage, marking, &k3, dt);
    system.derivative(&stage, time + dt, &mut k4)?;

    for i in 0..n {
        marking[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    Ok(())
}

fn offset(stage: &mut [f64], base: &[f64], slope: &[f64], h: f64) {
    for ((s, b), k) in stage.iter_mut().zip(base).zip(slope) {
        *s = b + h * k;
    }
}

/// One enabled continuous transition
pub(crate) struct Flow<'a> {
    pub id: &'a TransitionId,
    pub rate: &'a CompiledRate,
    pub inputs: &'a [ResolvedArc],
    pub outputs: &'a [ResolvedArc],
}

/// The flow system of a net for one step
pub(crate) struct FlowField<'a> {
    pub flows: Vec<Flow<'a>>,
    pub noise: &'a mut NoiseBank,
    pub policy: NegativeRatePolicy,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    /// Transitions already reported negative during this step
    pub warned: Vec<TransitionId>,
}

impl FlowSystem for FlowField<'_> {
    fn derivative(&mut self, marking: &[f64], time: f64, out: &mut [f64]) -> Result<()> {
        out.iter_mut().for_each(|d| *d = 0.0);
        for flow in &self.flows {
            let mut ctx = EvalContext::new(marking, time).with_noise(&mut *self.noise, flow.id);
            let mut rate = flow.rate.eval(&mut ctx)?;
            if rate < 0.0 {
                match self.policy {
                    NegativeRatePolicy::Halt => {
                        return Err(Error::NegativeRate {
                            transition: flow.id.clone(),
                            rate,
                            time,
                        });
                    }
                    NegativeRatePolicy::Warn => {
                        if !self.warned.contains(flow.id) {
                            tracing::warn!(
                                transition = %flow.id,
                                rate,
                                time,
                                "negative continuous rate, no flow applied"
                            );
                            self.warned.push(flow.id.clone());
                            self.diagnostics.push(Diagnostic::NegativeRate {
                                transition: flow.id.clone(),
                                rate,
                                time,
                            });
                        }
                        rate = 0.0;
                    }
                }
            }
            for arc in flow.inputs.iter().filter(|a| a.kind.consumes_tokens()) {
                if let Some(d) = out.get_mut(arc.place_index) {
                    *d -= rate * arc.weight;
                }
            }
            for arc in flow.outputs {
                if let Some(d) = out.get_mut(arc.place_index) {
                    *d += rate * arc.weight;
                }
            }
        }
        Ok(())
    }
}
