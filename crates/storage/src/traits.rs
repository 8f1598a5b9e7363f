use branchplan_core::{PlanAggregate, PlanId};

use crate::error::StorageError;

/// Persistence port for plan aggregates.
///
/// An aggregate is always written as a whole. `save` is all-or-nothing and
/// optimistic: it commits only when the stored version equals
/// `aggregate.version()`, and returns the new version it wrote.
pub trait PlanStore {
    fn load(&self, plan_id: PlanId) -> Result<Option<PlanAggregate>, StorageError>;

    /// Store a new aggregate. Fails with `AlreadyExists` if the id is taken.
    fn insert(&mut self, aggregate: &PlanAggregate) -> Result<(), StorageError>;

    fn save(&mut self, aggregate: &PlanAggregate) -> Result<u64, StorageError>;

    fn list_plan_ids(&self) -> Result<Vec<PlanId>, StorageError>;
}
