use rand::Rng;

/// A source of uniformly distributed numbers in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Randomness from the thread-local generator.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen()
    }
}

/// Always yields the same value. Pins the outcome of the random branch.
#[derive(Debug, Copy, Clone)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Rule-based check applied to every vote attempt.
///
/// An attempt is flagged if the voter took less than `min_duration` seconds,
/// and otherwise flagged at random with the given `probability`.
pub struct FraudHeuristic {
    min_duration: f64,
    probability: f64,
    random: Box<dyn RandomSource>,
}

impl FraudHeuristic {
    pub fn new(min_duration: f64, probability: f64, random: Box<dyn RandomSource>) -> Self {
        Self {
            min_duration,
            probability,
            random,
        }
    }

    /// Decide whether a vote that took `voting_duration` seconds is fraudulent.
    pub fn is_fraudulent(&self, voting_duration: f64) -> bool {
        if voting_duration.is_nan() || voting_duration < self.min_duration {
            return true;
        }
        self.random.next_f64() < self.probability
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    /// Random value that never trips the default 5% branch.
    pub const NEVER: f64 = 0.99;
    /// Random value that always trips the default 5% branch.
    pub const ALWAYS: f64 = 0.0;

    impl FraudHeuristic {
        pub fn example(fraud: bool) -> Self {
            let value = if fraud { ALWAYS } else { NEVER };
            Self::new(3.0, 0.05, Box::new(FixedRandom(value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_fast_is_always_fraud() {
        let heuristic = FraudHeuristic::example(false);
        assert!(heuristic.is_fraudulent(0.0));
        assert!(heuristic.is_fraudulent(1.0));
        assert!(heuristic.is_fraudulent(2.999));
        assert!(heuristic.is_fraudulent(-5.0));
        assert!(heuristic.is_fraudulent(f64::NAN));
    }

    #[test]
    fn slow_enough_passes_unless_random_trips() {
        let clean = FraudHeuristic::example(false);
        assert!(!clean.is_fraudulent(3.0));
        assert!(!clean.is_fraudulent(10.0));

        let flagged = FraudHeuristic::example(true);
        assert!(flagged.is_fraudulent(3.0));
        assert!(flagged.is_fraudulent(10.0));
    }

    #[test]
    fn random_branch_boundary() {
        let at_threshold = FraudHeuristic::new(3.0, 0.05, Box::new(FixedRandom(0.05)));
        assert!(!at_threshold.is_fraudulent(10.0));

        let below_threshold = FraudHeuristic::new(3.0, 0.05, Box::new(FixedRandom(0.0499)));
        assert!(below_threshold.is_fraudulent(10.0));
    }

    #[test]
    fn thread_random_in_range() {
        for _ in 0..1000 {
            let value = ThreadRandom.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }
}
