//! Adaptive time-step subdivision by step doubling.
//!
//! A frame of length `total_time` is covered by sub-steps. Each candidate
//! sub-step is taken once at full size and once as two halves; when the two
//! results disagree by more than the error threshold the sub-step is halved
//! and retried. After an accepted sub-step the next attempt doubles.
//!
//! Sub-steps at or below `min_dt` are accepted unconditionally, which is
//! the only termination guarantee for a stiff or discontinuous system.

use super::{ERROR_THRESHOLD, MIN_DT};

/// A system that can be advanced in time.
pub trait Steppable {
    type State: Clone;

    /// Advance `state` by `dt`, producing a new state.
    fn update(&self, state: &Self::State, dt: f64) -> Self::State;

    /// Error metric between two estimates of the same instant.
    fn distance(&self, a: &Self::State, b: &Self::State) -> f64;
}

/// One accepted sub-step: the state at its end and its duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SubStep<T> {
    pub state: T,
    pub dt: f64,
}

/// The ordered sub-steps covering one requested interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<T> {
    steps: Vec<SubStep<T>>,
}

impl<T> ResultSet<T> {
    /// Wrap an ordered list of sub-steps.
    pub fn new(steps: Vec<SubStep<T>>) -> Self {
        Self { steps }
    }

    /// All sub-steps in time order.
    pub fn steps(&self) -> &[SubStep<T>] {
        &self.steps
    }

    /// Number of sub-steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no sub-step was taken.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all sub-step durations.
    pub fn total_time(&self) -> f64 {
        self.steps.iter().map(|s| s.dt).sum()
    }

    /// The first sub-step.
    pub fn first(&self) -> Option<&SubStep<T>> {
        self.steps.first()
    }

    /// The final sub-step.
    pub fn last(&self) -> Option<&SubStep<T>> {
        self.steps.last()
    }

    /// Iterate over sub-steps in time order.
    pub fn iter(&self) -> std::slice::Iter<'_, SubStep<T>> {
        self.steps.iter()
    }

    /// Duration-weighted average of a per-state quantity.
    ///
    /// Returns 0 for an empty set.
    pub fn time_average(&self, value: impl Fn(&T) -> f64) -> f64 {
        let total = self.total_time();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self.steps.iter().map(|s| value(&s.state) * s.dt).sum();
        weighted / total
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a SubStep<T>;
    type IntoIter = std::slice::Iter<'a, SubStep<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Step-doubling integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestepSubdivisions {
    /// Largest acceptable distance between coarse and fine estimates
    pub error_threshold: f64,
    /// Hard floor on sub-step size
    pub min_dt: f64,
}

impl Default for TimestepSubdivisions {
    fn default() -> Self {
        Self {
            error_threshold: ERROR_THRESHOLD,
            min_dt: MIN_DT,
        }
    }
}

impl TimestepSubdivisions {
    /// Create an integrator with explicit tolerances.
    pub fn new(error_threshold: f64, min_dt: f64) -> Self {
        debug_assert!(min_dt > 0.0, "min_dt must be positive");
        Self {
            error_threshold,
            min_dt,
        }
    }

    /// Advance `initial` over `total_time`, returning every accepted sub-step.
    ///
    /// The returned durations sum to `total_time`.
    pub fn subdivide<S: Steppable>(
        &self,
        steppable: &S,
        initial: S::State,
        total_time: f64,
    ) -> ResultSet<S::State> {
        debug_assert!(total_time.is_finite(), "total time must be finite");

        let mut steps = Vec::new();
        let mut state = initial;
        let mut elapsed = 0.0;
        let mut attempted = total_time;

        while elapsed < total_time {
            let remaining = total_time - elapsed;
            let last = attempted >= remaining;
            let dt = if last { remaining } else { attempted };

            let (next, taken) = self.accept(steppable, &state, dt);
            steps.push(SubStep {
                state: next.clone(),
                dt: taken,
            });

            if last && taken == dt {
                break;
            }
            elapsed += taken;
            state = next;
            attempted = 2.0 * taken;
        }

        ResultSet::new(steps)
    }

    /// Find the largest sub-step no bigger than `dt` that meets the error
    /// threshold, returning the fine estimate and the size used.
    fn accept<S: Steppable>(&self, steppable: &S, state: &S::State, mut dt: f64) -> (S::State, f64) {
        loop {
            if dt <= self.min_dt {
                log::debug!("forced acceptance of sub-step {:e}", dt);
                return (steppable.update(state, dt), dt);
            }

            let coarse = steppable.update(state, dt);
            let half = steppable.update(state, dt / 2.0);
            let fine = steppable.update(&half, dt / 2.0);

            let error = steppable.distance(&coarse, &fine);
            log::trace!("sub-step {:e}: error {:e}", dt, error);
            if error < self.error_threshold {
                return (fine, dt);
            }
            dt /= 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Forward-Euler exponential decay: coarse and fine steps disagree by a
    /// dt^2 term, so the integrator has to subdivide.
    struct Decay {
        rate: f64,
    }

    impl Steppable for Decay {
        type State = f64;

        fn update(&self, state: &f64, dt: f64) -> f64 {
            state * (1.0 - self.rate * dt)
        }

        fn distance(&self, a: &f64, b: &f64) -> f64 {
            (a - b).abs()
        }
    }

    #[test]
    fn test_substeps_sum_to_total_time() {
        let decay = Decay { rate: 3.0 };
        let integrator = TimestepSubdivisions::default();
        for total in [1.0 / 60.0, 0.1, 0.37, 1.0] {
            let result = integrator.subdivide(&decay, 1.0, total);
            assert!(result.len() > 1);
            assert_relative_eq!(result.total_time(), total, max_relative = 1e-12);
            assert!(result.iter().all(|s| s.dt > 0.0));
        }
    }

    #[test]
    fn test_huge_threshold_takes_one_step() {
        let decay = Decay { rate: 3.0 };
        let integrator = TimestepSubdivisions::new(1e300, MIN_DT);
        let result = integrator.subdivide(&decay, 1.0, 0.25);
        assert_eq!(result.len(), 1);
        assert_eq!(result.steps()[0].dt, 0.25);
        // The fine estimate is kept.
        assert_relative_eq!(result.steps()[0].state, (1.0 - 3.0 * 0.125) * (1.0 - 3.0 * 0.125));
    }

    #[test]
    fn test_min_dt_floor_forces_acceptance() {
        let decay = Decay { rate: 3.0 };
        // A zero threshold can never be met; only the floor ends each attempt.
        let integrator = TimestepSubdivisions::new(0.0, 1e-3);
        let result = integrator.subdivide(&decay, 1.0, 0.01);
        assert!(result.iter().all(|s| s.dt <= 1e-3));
        assert_relative_eq!(result.total_time(), 0.01, max_relative = 1e-12);
    }

    #[test]
    fn test_accepted_steps_grow_after_acceptance() {
        let decay = Decay { rate: 3.0 };
        let integrator = TimestepSubdivisions::new(1e-6, 1e-9);
        let result = integrator.subdivide(&decay, 1.0, 1.0);
        let first = result.first().map(|s| s.dt).unwrap_or_default();
        let max = result.iter().map(|s| s.dt).fold(0.0, f64::max);
        assert!(max > first);
    }

    #[test]
    fn test_time_average_weights_by_duration() {
        let set = ResultSet::new(vec![
            SubStep { state: 4.0, dt: 0.25 },
            SubStep { state: 0.0, dt: 0.75 },
        ]);
        assert_relative_eq!(set.time_average(|s| *s), 1.0);
        assert_eq!(set.last().map(|s| s.state), Some(0.0));
        assert_eq!(ResultSet::<f64>::new(Vec::new()).time_average(|s| *s), 0.0);
    }
}
