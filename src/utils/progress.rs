use std::time::Duration;

/// How far a sequence of runs has got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    finished: usize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Progress { finished: 0, total }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Marks one more run as finished, whatever its outcome was.
    pub fn advance(self) -> Self {
        Progress {
            finished: (self.finished + 1).min(self.total),
            total: self.total,
        }
    }

    /// Remaining time assuming every outstanding run costs `per_run`.
    pub fn eta(&self, per_run: Duration) -> Duration {
        let outstanding = u32::try_from(self.total - self.finished).unwrap_or(u32::MAX);
        per_run.saturating_mul(outstanding)
    }

    /// `"3/12 (ETA: 0 hrs 18 min, done around 14:05)"`
    pub fn describe(&self, per_run: Duration) -> String {
        let eta = self.eta(per_run);
        let minutes = eta.as_secs() / 60;
        let done_at = chrono::Duration::from_std(eta)
            .ok()
            .and_then(|eta| chrono::Local::now().checked_add_signed(eta))
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| String::from("never"));
        format!(
            "{}/{} (ETA: {} hrs {} min, done around {})",
            self.finished + 1,
            self.total,
            minutes / 60,
            minutes % 60,
            done_at
        )
    }
}
