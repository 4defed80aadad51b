use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome classes the limiter reacts to. Anything not listed
/// here (protocol rejections, validation errors) is irrelevant to
/// backpressure and should not be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Network saturation, rate limiting, or a timeout.
    Saturated,
    /// A clean submission, landed or not.
    Success,
}

/// Adaptive concurrency governor bounding how many bundles a polling tick
/// asks the bundle loader for. Multiplicative-decrease on saturation,
/// additive-increase on sustained success, floor 1 / ceiling `max_limit`.
pub struct ProcessingLimiter {
    limit: AtomicU32,
    max_limit: u32,
}

impl ProcessingLimiter {
    pub fn new(max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            limit: AtomicU32::new(max_limit),
            max_limit,
        }
    }

    pub fn limit_value(&self) -> u32 {
        self.limit.load(Ordering::Relaxed)
    }

    /// Halves the limit (floor 1) on saturation signals, or grows it by one
    /// (bounded by `max_limit`) on success. Single-instruction updates are
    /// fine here: a slightly stale read racing a concurrent report only
    /// costs one tick of over/under-shoot, never correctness.
    pub fn report_submission_result(&self, outcome: SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Saturated => {
                let current = self.limit.load(Ordering::Relaxed);
                let next = (current / 2).max(1);
                self.limit.store(next, Ordering::Relaxed);
            }
            SubmissionOutcome::Success => {
                let current = self.limit.load(Ordering::Relaxed);
                let next = (current + 1).min(self.max_limit);
                self.limit.store(next, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_halves_and_floors_at_one() {
        let limiter = ProcessingLimiter::new(16);
        limiter.report_submission_result(SubmissionOutcome::Saturated);
        assert_eq!(limiter.limit_value(), 8);
        for _ in 0..10 {
            limiter.report_submission_result(SubmissionOutcome::Saturated);
        }
        assert_eq!(limiter.limit_value(), 1);
    }

    #[test]
    fn success_grows_additively_bounded_by_max() {
        let limiter = ProcessingLimiter::new(4);
        limiter.report_submission_result(SubmissionOutcome::Saturated);
        assert_eq!(limiter.limit_value(), 2);
        limiter.report_submission_result(SubmissionOutcome::Success);
        limiter.report_submission_result(SubmissionOutcome::Success);
        limiter.report_submission_result(SubmissionOutcome::Success);
        limiter.report_submission_result(SubmissionOutcome::Success);
        assert_eq!(limiter.limit_value(), 4);
    }

    #[test]
    fn starts_at_max_limit() {
        let limiter = ProcessingLimiter::new(10);
        assert_eq!(limiter.limit_value(), 10);
    }
}
