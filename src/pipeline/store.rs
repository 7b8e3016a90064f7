//! Index-addressed result store with snapshot subscribers.
//!
//! The store is owned by one pipeline run. It is written only through
//! [`ResultStore::set`] (driven by the scheduler's resolution callback) and
//! read through immutable [`Snapshot`]s.

use std::sync::Arc;

use super::{AnalysisResult, PipelineError};

type Subscriber = Box<dyn FnMut(&Snapshot) + Send>;

/// Point-in-time copy of every unit's result, in index order.
///
/// Cloning is cheap; mutating a copy obtained via [`Snapshot::into_vec`]
/// never reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<[AnalysisResult]>);

impl Snapshot {
    pub fn get(&self, index: usize) -> Option<&AnalysisResult> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[AnalysisResult] {
        &self.0
    }

    /// Number of units that have reached a terminal result.
    pub fn resolved(&self) -> usize {
        self.0.iter().filter(|r| r.is_terminal()).count()
    }

    pub fn into_vec(self) -> Vec<AnalysisResult> {
        self.0.to_vec()
    }
}

#[derive(Default)]
pub struct ResultStore {
    results: Vec<AnalysisResult>,
    subscribers: Vec<Subscriber>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the store to `unit_count` pending entries.
    pub fn initialize(&mut self, unit_count: usize) {
        self.results = vec![AnalysisResult::Pending; unit_count];
    }

    /// Register a callback that receives a snapshot after every write.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Record a terminal result for `index` and notify subscribers.
    ///
    /// Fails with [`PipelineError::InvariantViolation`] if the index is out of
    /// range, already terminal, or `result` is `Pending`.
    pub fn set(&mut self, index: usize, result: AnalysisResult) -> Result<(), PipelineError> {
        if !result.is_terminal() {
            return Err(PipelineError::InvariantViolation(format!(
                "index {index} cannot transition back to pending"
            )));
        }
        let len = self.results.len();
        let slot = self.results.get_mut(index).ok_or_else(|| {
            PipelineError::InvariantViolation(format!("index {index} out of range ({len} units)"))
        })?;
        if slot.is_terminal() {
            return Err(PipelineError::InvariantViolation(format!(
                "index {index} already resolved"
            )));
        }

        *slot = result;
        self.publish();
        Ok(())
    }

    /// Mark every still-pending entry as failed. Returns how many were changed.
    pub fn fail_pending(&mut self, reason: &str) -> usize {
        let mut changed = 0;
        for slot in self.results.iter_mut().filter(|r| !r.is_terminal()) {
            *slot = AnalysisResult::failed(reason);
            changed += 1;
        }
        if changed > 0 {
            self.publish();
        }
        changed
    }

    pub fn get(&self, index: usize) -> Option<&AnalysisResult> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(Arc::from(self.results.as_slice()))
    }

    fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for subscriber in &mut self.subscribers {
            subscriber(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn initialize_sets_all_pending() {
        let mut store = ResultStore::new();
        store.initialize(3);
        assert_eq!(store.len(), 3);
        assert!(store.snapshot().iter().all(|r| *r == AnalysisResult::Pending));
    }

    #[test]
    fn set_transitions_once() {
        let mut store = ResultStore::new();
        store.initialize(2);

        store.set(1, AnalysisResult::Succeeded(json!({}))).unwrap();
        assert_eq!(store.get(1), Some(&AnalysisResult::Succeeded(json!({}))));

        let err = store.set(1, AnalysisResult::failed("late")).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
        assert_eq!(store.get(1), Some(&AnalysisResult::Succeeded(json!({}))));
    }

    #[test]
    fn set_rejects_pending_and_out_of_range() {
        let mut store = ResultStore::new();
        store.initialize(1);
        assert!(store.set(0, AnalysisResult::Pending).is_err());
        assert!(store.set(5, AnalysisResult::failed("x")).is_err());
        assert_eq!(store.get(0), Some(&AnalysisResult::Pending));
    }

    #[test]
    fn subscribers_see_every_write() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store = ResultStore::new();
        store.initialize(2);
        {
            let seen = Arc::clone(&seen);
            store.subscribe(move |snap| seen.lock().unwrap().push(snap.resolved()));
        }

        store.set(0, AnalysisResult::failed("x")).unwrap();
        store.set(1, AnalysisResult::Succeeded(json!({"a": 1}))).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn fail_pending_only_touches_pending() {
        let mut store = ResultStore::new();
        store.initialize(3);
        store.set(1, AnalysisResult::Succeeded(json!({}))).unwrap();

        assert_eq!(store.fail_pending("cancelled"), 2);
        assert_eq!(store.get(0), Some(&AnalysisResult::failed("cancelled")));
        assert_eq!(store.get(1), Some(&AnalysisResult::Succeeded(json!({}))));
        assert_eq!(store.fail_pending("cancelled"), 0);
    }
}
