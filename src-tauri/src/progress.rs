use std::sync::atomic::{AtomicU8, Ordering};

/// Callback receiving integer percentages.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Forwards percentages to a sink, clamped to 100 and never going backwards.
pub struct ProgressReporter<'a> {
    last: AtomicU8,
    sink: ProgressFn<'a>,
}

impl<'a> ProgressReporter<'a> {
    /// Creates the reporter and announces 0%.
    pub fn start(sink: ProgressFn<'a>) -> Self {
        sink(0);
        Self {
            last: AtomicU8::new(0),
            sink,
        }
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            (self.sink)(percent);
        }
    }

    /// Report `floor(base + fraction * span)` for a fraction in `0.0..=1.0`.
    pub fn report_fraction(&self, base: f64, span: f64, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.report((base + fraction * span).floor() as u8);
    }

    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn regressions_and_repeats_are_swallowed() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let reporter = ProgressReporter::start(&sink);
        for p in [10, 5, 10, 40, 39, 250] {
            reporter.report(p);
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 10, 40, 100]);
        assert_eq!(reporter.last(), 100);
    }

    #[test]
    fn fractions_are_floored_into_their_span() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let reporter = ProgressReporter::start(&sink);
        reporter.report_fraction(50.0, 50.0, 0.499);
        reporter.report_fraction(50.0, 50.0, f64::NAN);
        reporter.report_fraction(50.0, 50.0, 1.0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 74, 100]);
    }
}
