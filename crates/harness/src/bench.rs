use std::collections::BTreeSet;
use std::sync::Arc;

use branchplan_core::{
    BranchId, Money, OverrideFields, Patch, PlanId, ResolvedView, TemplateFields,
};
use branchplan_engine::{
    AggregationService, CreatePlan, EngineConfig, EngineError, OverrideManager, PlanSummary,
    StaticDirectory,
};
use branchplan_storage::{PlanStore, SqliteStorage, StorageError};

/// An override manager over a store, with a four-branch directory.
pub struct TestBench<S: PlanStore = SqliteStorage> {
    pub manager: OverrideManager<S>,
    pub directory: Arc<StaticDirectory>,
}

impl TestBench {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, StorageError> {
        Ok(Self::over(SqliteStorage::open_in_memory()?, config))
    }
}

impl<S: PlanStore> TestBench<S> {
    pub fn over(storage: S, config: EngineConfig) -> Self {
        let directory = Arc::new(sample_directory());
        let manager = OverrideManager::new(storage, config).with_directory(directory.clone());
        Self { manager, directory }
    }

    /// Create the "Gold" plan assigned to B1 and B2.
    pub fn create_gold(&mut self) -> Result<PlanId, EngineError> {
        let plan = self.manager.create_plan(CreatePlan {
            fields: gold_fields(),
            assigned_branch_ids: branch_ids(&["B1", "B2"]),
        })?;
        Ok(plan.plan_id())
    }

    pub fn resolve(&self, plan_id: PlanId, branch: &str) -> Result<ResolvedView, EngineError> {
        self.manager.effective_plan(plan_id, Some(&BranchId::from(branch)))
    }

    pub fn template_view(&self, plan_id: PlanId) -> Result<ResolvedView, EngineError> {
        self.manager.effective_plan(plan_id, None)
    }

    pub fn summary(&self, plan_id: PlanId) -> Result<PlanSummary, EngineError> {
        let aggregate = self.manager.load(plan_id)?;
        Ok(AggregationService::new(self.directory.as_ref()).summarize(&aggregate))
    }
}

pub fn gold_fields() -> TemplateFields {
    TemplateFields {
        name: "Gold".into(),
        description: Some("Unlimited gym access".into()),
        price: Money::new(500_000, "VND"),
        duration_in_months: 1,
        benefits: vec!["Pool".into(), "Sauna".into()],
        is_active: true,
    }
}

pub fn price_override(amount: i64) -> OverrideFields {
    OverrideFields {
        price: Patch::Set(Money::new(amount, "VND")),
        ..Default::default()
    }
}

pub fn paused_override() -> OverrideFields {
    OverrideFields {
        is_active: Patch::Set(false),
        ..Default::default()
    }
}

pub fn branch_ids(ids: &[&str]) -> BTreeSet<BranchId> {
    ids.iter().map(|b| BranchId::from(*b)).collect()
}

pub fn sample_directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_branch("B1", "District 1")
        .with_branch("B2", "District 2")
        .with_branch("B3", "Thu Duc")
        .with_branch("B4", "Binh Thanh")
}

/// A file-backed store under `dir`; every call opens a new connection to the
/// same database.
pub fn file_store(dir: &tempfile::TempDir) -> Result<SqliteStorage, StorageError> {
    SqliteStorage::open(dir.path().join("plans.db"))
}
