use crate::dag::{Dag, Distribution, Value};
use crate::error::{RbError, RbResult};
use crate::LogProbability;
use petgraph::graph::NodeIndex;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution as _, Exp};
use statrs::distribution::{Discrete, Poisson};

/// A sorted set of distinct event times in `(0, age]` (§3). Distinctness is
/// an invariant of `insert`/`remove`, not of the bare vector, so any
/// construction path that bypasses these methods (e.g. reading a `Value`
/// off the DAG) is responsible for its own ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedEventTimes {
    times: Vec<f64>,
}

impl OrderedEventTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.times.iter().copied()
    }

    fn position(&self, t: f64) -> Result<usize, usize> {
        self.times
            .binary_search_by(|probe| probe.partial_cmp(&t).expect("event time is NaN"))
    }

    pub fn insert(&mut self, t: f64) -> RbResult<()> {
        match self.position(t) {
            Ok(_) => Err(RbError::Validation(format!("event time {t} is already present"))),
            Err(pos) => {
                self.times.insert(pos, t);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, t: f64) -> RbResult<()> {
        match self.position(t) {
            Ok(pos) => {
                self.times.remove(pos);
                Ok(())
            }
            Err(_) => Err(RbError::Validation(format!("event time {t} is not present"))),
        }
    }

    /// `proposeEventTime`: uniform on `(0, age]`, with density `-log(age)`.
    pub fn propose_event_time(age: f64, rng: &mut SmallRng) -> (f64, LogProbability) {
        let u: f64 = rng.random();
        ((1.0 - u) * age + u * f64::MIN_POSITIVE, -age.ln())
    }

    /// `pickRandomEvent`: uniform over existing events, density `-log(age)`.
    pub fn pick_random_event(&self, age: f64, rng: &mut SmallRng) -> Option<(f64, LogProbability)> {
        if self.times.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..self.times.len());
        Some((self.times[idx], -age.ln()))
    }

    fn as_value(&self) -> Value {
        Value::RealVector(self.times.clone())
    }
}

impl crate::Arbitrary for OrderedEventTimes {
    /// a small random ascending set of event times in `(0, 10]`, for
    /// randomized test fixtures (duplicate draws are vanishingly unlikely
    /// on a continuous range and are simply skipped).
    fn random() -> Self {
        let mut rng = rand::rng();
        let age = 10.0;
        let n = rng.random_range(0..8);
        let mut events = OrderedEventTimes::new();
        while events.len() < n {
            let t = rng.random::<f64>() * age;
            let _ = events.insert(t);
        }
        events
    }
}

impl From<Vec<f64>> for OrderedEventTimes {
    fn from(mut times: Vec<f64>) -> Self {
        times.sort_by(|a, b| a.partial_cmp(b).expect("event time is NaN"));
        Self { times }
    }
}

/// Marked homogeneous Poisson point process on `(0, age]` (§4.F.1): `n`
/// ordered event times with density `Poisson(n; rate·age)` when every time
/// falls in range, `-inf` otherwise.
#[derive(Debug)]
pub struct MarkovTimesDistribution {
    pub rate: NodeIndex,
    pub age: NodeIndex,
}

impl MarkovTimesDistribution {
    pub fn new(rate: NodeIndex, age: NodeIndex) -> Self {
        Self { rate, age }
    }
}

impl Distribution for MarkovTimesDistribution {
    fn log_density(&self, dag: &Dag, value: &Value) -> LogProbability {
        let times = match value.as_real_vector() {
            Some(t) => t,
            None => return f64::NEG_INFINITY,
        };
        let rate = match dag.raw_value(self.rate).as_real() {
            Some(r) => r,
            None => return f64::NEG_INFINITY,
        };
        let age = match dag.raw_value(self.age).as_real() {
            Some(a) => a,
            None => return f64::NEG_INFINITY,
        };
        if rate < 0.0 || age < 0.0 {
            return f64::NEG_INFINITY;
        }
        if times.iter().any(|&t| t <= 0.0 || t > age) {
            return f64::NEG_INFINITY;
        }
        let mu = rate * age;
        let n = times.len();
        if mu == 0.0 {
            return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
        }
        match Poisson::new(mu) {
            Ok(p) => p.ln_pmf(n as u64),
            Err(_) => f64::NEG_INFINITY,
        }
    }

    fn redraw(&self, dag: &Dag, rng: &mut SmallRng) -> Value {
        let rate = dag.raw_value(self.rate).as_real().unwrap_or(0.0);
        let age = dag.raw_value(self.age).as_real().unwrap_or(0.0);
        let mut events = OrderedEventTimes::new();
        if rate > 0.0 && age > 0.0 {
            let gap = Exp::new(rate).expect("rate must be positive");
            let mut t = 0.0;
            loop {
                t += gap.sample(rng);
                if t > age {
                    break;
                }
                events.times.push(t);
            }
        }
        events.as_value()
    }

    fn swap_parameter(&mut self, old: NodeIndex, new: NodeIndex) {
        if self.rate == old {
            self.rate = new;
        }
        if self.age == old {
            self.age = new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Dag;
    use crate::Arbitrary;
    use rand::SeedableRng;

    #[test]
    fn arbitrary_event_times_are_always_ascending_and_in_range() {
        for _ in 0..20 {
            let events = OrderedEventTimes::random();
            let times: Vec<f64> = events.iter().collect();
            assert!(times.windows(2).all(|w| w[0] < w[1]));
            assert!(times.iter().all(|&t| t > 0.0 && t <= 10.0));
        }
    }

    #[test]
    fn insert_rejects_duplicates_and_keeps_ascending_order() {
        let mut events = OrderedEventTimes::new();
        events.insert(2.0).unwrap();
        events.insert(1.0).unwrap();
        assert!(events.insert(1.0).is_err());
        assert_eq!(events.iter().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[test]
    fn remove_rejects_absent_times() {
        let mut events = OrderedEventTimes::new();
        events.insert(1.0).unwrap();
        assert!(events.remove(5.0).is_err());
        events.remove(1.0).unwrap();
        assert!(events.is_empty());
    }

    /// S2: age=10, rate=0 -> simulate yields the empty set and logP({}) = 0.
    #[test]
    fn scenario_s2_zero_rate() {
        let mut dag = Dag::new();
        let rate = dag.add_constant("rate", Value::Real(0.0));
        let age = dag.add_constant("age", Value::Real(10.0));
        let dist = MarkovTimesDistribution::new(rate, age);
        let mut rng = SmallRng::seed_from_u64(0);
        let simulated = dist.redraw(&dag, &mut rng);
        assert_eq!(simulated, Value::RealVector(vec![]));
        assert_eq!(dist.log_density(&dag, &Value::RealVector(vec![])), 0.0);
    }

    /// S3: rate=1, age=5, three events at {1,2,3}: logP = log Poisson(3; 5).
    #[test]
    fn scenario_s3_three_events() {
        let mut dag = Dag::new();
        let rate = dag.add_constant("rate", Value::Real(1.0));
        let age = dag.add_constant("age", Value::Real(5.0));
        let dist = MarkovTimesDistribution::new(rate, age);
        let ll = dist.log_density(&dag, &Value::RealVector(vec![1.0, 2.0, 3.0]));
        let expected = Poisson::new(5.0).unwrap().ln_pmf(3);
        assert!((ll - expected).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_event_is_domain_violation_not_error() {
        let mut dag = Dag::new();
        let rate = dag.add_constant("rate", Value::Real(1.0));
        let age = dag.add_constant("age", Value::Real(5.0));
        let dist = MarkovTimesDistribution::new(rate, age);
        let ll = dist.log_density(&dag, &Value::RealVector(vec![1.0, 7.0]));
        assert_eq!(ll, f64::NEG_INFINITY);
    }
}
