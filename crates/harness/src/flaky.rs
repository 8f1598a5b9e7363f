use branchplan_core::{PlanAggregate, PlanId};
use branchplan_storage::{PlanStore, StorageError};

/// Wraps a real store and fails the next `save` on request, before anything
/// reaches the inner store.
pub struct FlakyStore<S> {
    inner: S,
    fail_next_save: bool,
    saves: usize,
}

impl<S: PlanStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_next_save: false,
            saves: 0,
        }
    }

    pub fn fail_next_save(&mut self) {
        self.fail_next_save = true;
    }

    /// Saves that reached the inner store.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl<S: PlanStore> PlanStore for FlakyStore<S> {
    fn load(&self, plan_id: PlanId) -> Result<Option<PlanAggregate>, StorageError> {
        self.inner.load(plan_id)
    }

    fn insert(&mut self, aggregate: &PlanAggregate) -> Result<(), StorageError> {
        self.inner.insert(aggregate)
    }

    fn save(&mut self, aggregate: &PlanAggregate) -> Result<u64, StorageError> {
        if std::mem::take(&mut self.fail_next_save) {
            return Err(StorageError::Serialization("injected save failure".into()));
        }
        let version = self.inner.save(aggregate)?;
        self.saves += 1;
        Ok(version)
    }

    fn list_plan_ids(&self) -> Result<Vec<PlanId>, StorageError> {
        self.inner.list_plan_ids()
    }
}
