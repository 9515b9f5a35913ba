//! Barrier parameter update strategies.

/// Monotone (Fiacco–McCormick) update: once the barrier subproblem is
/// solved to within κ_ε·μ, the parameter drops by
/// max(ε_tol/10, min(κ_μ·μ, μ^θ_μ)), possibly several times in a row.
#[derive(Clone)]
pub struct MonotoneBarrierUpdate {
    barrier_parameter: f64,
    kappa_mu: f64,
    theta_mu: f64,
    kappa_epsilon: f64,
    tolerance: f64,
}

impl MonotoneBarrierUpdate {
    pub fn new(
        initial_parameter: f64,
        kappa_mu: f64,
        theta_mu: f64,
        kappa_epsilon: f64,
        tolerance: f64,
    ) -> Self {
        Self {
            barrier_parameter: initial_parameter,
            kappa_mu,
            theta_mu,
            kappa_epsilon,
            tolerance,
        }
    }

    pub fn barrier_parameter(&self) -> f64 {
        self.barrier_parameter
    }

    pub fn set_barrier_parameter(&mut self, barrier_parameter: f64) {
        self.barrier_parameter = barrier_parameter;
    }

    fn smallest_parameter(&self) -> f64 {
        self.tolerance / 10.0
    }

    /// Decrease μ while the μ-scaled KKT error of the barrier problem is
    /// small enough. `error` evaluates that error for a candidate μ (the
    /// complementarity term depends on it). Returns whether μ changed.
    pub fn update(&mut self, error: &dyn Fn(f64) -> f64) -> bool {
        let mut updated = false;
        for _ in 0..10 {
            let mu = self.barrier_parameter;
            if mu <= self.smallest_parameter()
                || error(mu) > self.kappa_epsilon * mu
            {
                break;
            }
            let decreased = (self.kappa_mu * mu)
                .min(mu.powf(self.theta_mu))
                .max(self.smallest_parameter());
            if decreased >= mu {
                break;
            }
            self.barrier_parameter = decreased;
            updated = true;
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_decrease_while_the_subproblem_is_unsolved() {
        let mut update = MonotoneBarrierUpdate::new(0.1, 0.2, 1.5, 10.0, 1e-6);
        let changed = update.update(&|_| 1e3);
        assert!(!changed);
        assert_eq!(update.barrier_parameter(), 0.1);
    }

    #[test]
    fn decrease_once_converged() {
        let mut update = MonotoneBarrierUpdate::new(0.1, 0.2, 1.5, 10.0, 1e-6);
        // error proportional to μ: always "converged", so μ races down to
        // the floor within the per-call cap
        let changed = update.update(&|mu| 0.1 * mu);
        assert!(changed);
        assert!(update.barrier_parameter() < 0.1);
        for _ in 0..20 {
            update.update(&|mu| 0.1 * mu);
        }
        assert!((update.barrier_parameter() - 1e-7).abs() < 1e-12);
    }
}
