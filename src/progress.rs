use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub percentage: usize,
}

type Listener = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Completion counter shared by every worker of a batch.
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    listener: Option<Listener>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            listener: None,
        }
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn increment(&self) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let update = ProgressUpdate {
            completed,
            total: self.total,
            percentage: percentage_of(completed, self.total),
        };
        debug!(
            completed = update.completed,
            total = update.total,
            percentage = update.percentage,
            "progress"
        );
        if let Some(listener) = self.listener.as_ref() {
            listener(update);
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn percentage(&self) -> usize {
        percentage_of(self.completed(), self.total)
    }
}

fn percentage_of(completed: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    ((completed as u128 * 100) / total as u128) as usize
}

/// Single-line progress text for terminals, e.g. `Progress: 3/7 (42%)`.
pub fn format_progress(update: ProgressUpdate) -> String {
    format!(
        "Progress: {}/{} ({}%)",
        update.completed, update.total, update.percentage
    )
}
