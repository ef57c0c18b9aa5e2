//! Bounded trail of recent actions, attached to error reports.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::logging::entry::now_iso;
use crate::redact::Redactor;

/// Shared FIFO of timestamped breadcrumb strings; oldest dropped first.
///
/// Cloning yields another handle to the same trail, so the tracing layer and
/// the error handler can feed one ring.
#[derive(Clone)]
pub struct Breadcrumbs {
    trail: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
    redactor: Redactor,
}

impl Breadcrumbs {
    pub fn new(capacity: usize) -> Self {
        Self {
            trail: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            redactor: Redactor::new(),
        }
    }

    /// Append `"<timestamp>: <message>"`, with secrets scrubbed.
    pub fn push(&self, message: &str) {
        let crumb = format!("{}: {}", now_iso(), self.redactor.redact_text(message));
        let mut trail = self.trail.lock();
        trail.push_back(crumb);
        while trail.len() > self.capacity {
            trail.pop_front();
        }
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.trail.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trail.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.lock().is_empty()
    }

    pub fn clear(&self) {
        self.trail.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_drops_oldest() {
        let crumbs = Breadcrumbs::new(50);
        for i in 0..60 {
            crumbs.push(&format!("action {}", i));
        }

        let trail = crumbs.snapshot();
        assert_eq!(trail.len(), 50);
        assert!(trail[0].ends_with(": action 10"));
        assert!(trail[49].ends_with(": action 59"));
    }

    #[test]
    fn test_clones_share_one_trail() {
        let crumbs = Breadcrumbs::new(5);
        let other = crumbs.clone();
        other.push("opened reader");

        assert_eq!(crumbs.len(), 1);
        crumbs.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_breadcrumbs_are_redacted() {
        let crumbs = Breadcrumbs::new(5);
        crumbs.push("login as reader@example.org");

        assert!(!crumbs.snapshot()[0].contains("reader@example.org"));
    }
}
