//! Append-only iteration log
//!
//! Every `record` bumps a revision published on a watch channel. The
//! refinement engine subscribes to it and treats a changed revision as the
//! signal to regenerate the optimized template.

use tokio::sync::watch;

use crate::types::Iteration;

pub struct IterationStore {
    iterations: Vec<Iteration>,
    revision: watch::Sender<usize>,
}

impl Default for IterationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IterationStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            iterations: Vec::new(),
            revision,
        }
    }

    /// Rebuild a store from a previously recorded log
    pub fn from_iterations(iterations: Vec<Iteration>) -> Self {
        let (revision, _) = watch::channel(iterations.len());
        Self {
            iterations,
            revision,
        }
    }

    /// Append an iteration and notify subscribers
    pub fn record(&mut self, iteration: Iteration) {
        self.iterations.push(iteration);
        let len = self.iterations.len();
        // send_replace never fails, even with no live receivers
        self.revision.send_replace(len);
    }

    pub fn all(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn latest(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Receiver that observes the log length after each `record`
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Score;

    fn iteration(n: usize) -> Iteration {
        Iteration {
            prompt: format!("prompt {}", n),
            output: format!("output {}", n),
            feedback: format!("feedback {}", n),
            score: Score::new(3),
        }
    }

    #[test]
    fn test_record_preserves_order() {
        let mut store = IterationStore::new();
        assert!(store.latest().is_none());

        store.record(iteration(1));
        store.record(iteration(2));

        assert_eq!(store.len(), 2);
        assert_eq!(store.all()[0].prompt, "prompt 1");
        assert_eq!(store.latest().map(|i| i.prompt.as_str()), Some("prompt 2"));
        assert_eq!(store.all()[1].feedback, "feedback 2");
    }

    #[test]
    fn test_subscribers_see_each_record() {
        let mut store = IterationStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.record(iteration(1));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert!(!rx.has_changed().unwrap());

        store.record(iteration(2));
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn test_restored_store_starts_unchanged() {
        let store = IterationStore::from_iterations(vec![iteration(1), iteration(2)]);
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 2);
        assert!(!rx.has_changed().unwrap());
    }
}
