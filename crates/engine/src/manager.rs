use std::collections::BTreeSet;
use std::sync::Arc;

use branchplan_core::{
    BranchId, PlanAggregate, PlanId, PlanTemplate, ResolvedView, TemplateFields, ValidationErrors,
    resolve,
    validation::{
        validate_assigned_branches, validate_batch_shape, validate_override,
        validate_override_currencies, validate_template,
    },
};
use branchplan_storage::{PlanStore, SqliteStorage};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, OrphanOverridePolicy, OutOfScopeReads};
use crate::directory::BranchDirectory;
use crate::error::EngineError;
use crate::request::{BatchRequest, CreatePlan, PlanPatch};

/// Entry point for reading and mutating plan aggregates.
///
/// Every mutation loads the aggregate, changes a private copy, validates it
/// and writes it back with a single `PlanStore::save`. A failed save leaves
/// the stored aggregate untouched, and a mutation that changes nothing does
/// not write at all.
pub struct OverrideManager<S: PlanStore = SqliteStorage> {
    storage: S,
    config: EngineConfig,
    directory: Option<Arc<dyn BranchDirectory + Send + Sync>>,
}

impl<S: PlanStore> OverrideManager<S> {
    pub fn new(storage: S, config: EngineConfig) -> Self {
        Self {
            storage,
            config,
            directory: None,
        }
    }

    /// Attach the directory used when `verify_branches` is on.
    pub fn with_directory(mut self, directory: Arc<dyn BranchDirectory + Send + Sync>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn load(&self, plan_id: PlanId) -> Result<PlanAggregate, EngineError> {
        self.storage
            .load(plan_id)?
            .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))
    }

    pub fn list_plans(&self) -> Result<Vec<PlanId>, EngineError> {
        Ok(self.storage.list_plan_ids()?)
    }

    /// `GET effective plan`: the resolved view for `branch_id`, or the bare
    /// template when no branch is given.
    pub fn effective_plan(
        &self,
        plan_id: PlanId,
        branch_id: Option<&BranchId>,
    ) -> Result<ResolvedView, EngineError> {
        let aggregate = self.load(plan_id)?;
        if let Some(branch_id) = branch_id
            && !aggregate.template().assigned_branch_ids.contains(branch_id)
        {
            match self.config.out_of_scope_reads {
                OutOfScopeReads::Reject => {
                    return Err(EngineError::BranchNotFound(format!(
                        "{branch_id} is not assigned to plan {plan_id}"
                    )));
                }
                OutOfScopeReads::Allow => {
                    warn!(%plan_id, %branch_id, "resolving plan for a branch outside its assigned set");
                }
            }
        }
        Ok(resolve(&aggregate, branch_id))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// `POST plan`: validate and store a new template with no overrides.
    pub fn create_plan(&mut self, request: CreatePlan) -> Result<PlanAggregate, EngineError> {
        let CreatePlan {
            mut fields,
            assigned_branch_ids,
        } = request;

        let mut errors = validate_template(&mut fields, &self.config.limits());
        errors.merge(validate_assigned_branches(&assigned_branch_ids));
        reject_invalid("create_plan", None, errors)?;
        self.require_known_branches(assigned_branch_ids.iter())?;

        let aggregate = PlanAggregate::new(PlanTemplate {
            plan_id: PlanId::new(),
            fields,
            assigned_branch_ids,
        });
        self.storage.insert(&aggregate)?;
        info!(
            plan_id = %aggregate.plan_id(),
            branches = aggregate.template().assigned_branch_ids.len(),
            "created plan"
        );
        Ok(aggregate)
    }

    /// Replace the template's scalar fields. Overrides and the assigned set
    /// are left as they are.
    pub fn update_template(
        &mut self,
        plan_id: PlanId,
        fields: TemplateFields,
    ) -> Result<PlanAggregate, EngineError> {
        self.update_template_at(plan_id, fields, None)
    }

    /// Apply a branch-scope batch: create or fully replace the override of
    /// every target branch, remove the override of every revert branch.
    /// Reverting a branch that has no override is a no-op.
    pub fn apply_batch(
        &mut self,
        plan_id: PlanId,
        request: BatchRequest,
    ) -> Result<PlanAggregate, EngineError> {
        self.apply_batch_at(plan_id, request, None)
    }

    /// Replace the template's assigned branch set. Overrides of branches that
    /// drop out are kept or deleted according to `orphan_overrides`.
    pub fn reassign_template(
        &mut self,
        plan_id: PlanId,
        assigned_branch_ids: BTreeSet<BranchId>,
    ) -> Result<PlanAggregate, EngineError> {
        reject_invalid(
            "reassign_template",
            Some(plan_id),
            validate_assigned_branches(&assigned_branch_ids),
        )?;
        self.require_known_branches(assigned_branch_ids.iter())?;

        let policy = self.config.orphan_overrides;
        self.mutate(plan_id, None, "reassign_template", move |draft, _| {
            let removed: Vec<BranchId> = draft
                .template()
                .assigned_branch_ids
                .difference(&assigned_branch_ids)
                .cloned()
                .collect();
            draft.set_assigned_branch_ids(assigned_branch_ids);

            for branch_id in removed {
                if !draft.has_override(&branch_id) {
                    continue;
                }
                match policy {
                    OrphanOverridePolicy::Cascade => {
                        draft.remove_override(&branch_id);
                        debug!(%plan_id, %branch_id, "removed override of unassigned branch");
                    }
                    OrphanOverridePolicy::Retain => {
                        debug!(%plan_id, %branch_id, "keeping override of unassigned branch");
                    }
                }
            }
            Ok(())
        })
    }

    /// `PATCH plan`. With `expected_version`, the call fails with `Conflict`
    /// unless the stored aggregate is still at that version.
    pub fn patch(
        &mut self,
        plan_id: PlanId,
        patch: PlanPatch,
        expected_version: Option<u64>,
    ) -> Result<PlanAggregate, EngineError> {
        debug!(%plan_id, scope = patch.scope(), ?expected_version, "patching plan");
        match patch {
            PlanPatch::Template { data } => self.update_template_at(plan_id, data, expected_version),
            PlanPatch::Branches(batch) => self.apply_batch_at(plan_id, batch, expected_version),
        }
    }

    fn update_template_at(
        &mut self,
        plan_id: PlanId,
        mut fields: TemplateFields,
        expected_version: Option<u64>,
    ) -> Result<PlanAggregate, EngineError> {
        reject_invalid(
            "update_template",
            Some(plan_id),
            validate_template(&mut fields, &self.config.limits()),
        )?;
        self.mutate(plan_id, expected_version, "update_template", move |draft, _| {
            reject_invalid(
                "update_template",
                Some(plan_id),
                validate_override_currencies(&fields.price, draft.overrides()),
            )?;
            draft.set_template_fields(fields);
            Ok(())
        })
    }

    fn apply_batch_at(
        &mut self,
        plan_id: PlanId,
        request: BatchRequest,
        expected_version: Option<u64>,
    ) -> Result<PlanAggregate, EngineError> {
        let BatchRequest {
            target_branch_ids,
            override_fields,
            revert_branch_ids,
        } = request;

        reject_invalid(
            "apply_batch",
            Some(plan_id),
            validate_batch_shape(&target_branch_ids, &revert_branch_ids, override_fields.is_some()),
        )?;
        self.require_known_branches(target_branch_ids.iter())?;

        let (targeted, reverted) = (target_branch_ids.len(), revert_branch_ids.len());
        let result = self.mutate(plan_id, expected_version, "apply_batch", move |draft, config| {
            let fields = match override_fields {
                Some(mut fields) if !target_branch_ids.is_empty() => {
                    let errors = validate_override(&mut fields, &draft.template().fields, &config.limits());
                    reject_invalid("apply_batch", Some(plan_id), errors)?;
                    Some(fields)
                }
                _ => None,
            };

            if let Some(fields) = fields {
                for branch_id in target_branch_ids {
                    let replaced = draft.put_override(branch_id.clone(), fields.clone()).is_some();
                    debug!(%plan_id, %branch_id, replaced, "wrote branch override");
                }
            }
            for branch_id in &revert_branch_ids {
                if draft.remove_override(branch_id).is_some() {
                    debug!(%plan_id, %branch_id, "reverted branch override");
                }
            }
            Ok(())
        })?;

        info!(%plan_id, version = result.version(), targeted, reverted, "applied override batch");
        Ok(result)
    }

    /// Load, change a copy with `apply`, and save it in one write.
    fn mutate<F>(
        &mut self,
        plan_id: PlanId,
        expected_version: Option<u64>,
        operation: &'static str,
        apply: F,
    ) -> Result<PlanAggregate, EngineError>
    where
        F: FnOnce(&mut PlanAggregate, &EngineConfig) -> Result<(), EngineError>,
    {
        let current = self.load(plan_id)?;
        if let Some(expected) = expected_version
            && expected != current.version()
        {
            warn!(%plan_id, expected, found = current.version(), operation, "stale plan version");
            return Err(EngineError::Conflict {
                plan_id: plan_id.to_string(),
                expected,
                found: current.version(),
            });
        }

        let mut draft = current.clone();
        apply(&mut draft, &self.config)?;

        if draft == current {
            debug!(%plan_id, operation, "mutation left plan unchanged; skipping save");
            return Ok(current);
        }

        match self.storage.save(&draft) {
            Ok(version) => {
                draft.set_version(version);
                info!(%plan_id, version, operation, "saved plan");
                Ok(draft)
            }
            Err(err) => {
                let err = EngineError::from(err);
                warn!(%plan_id, operation, error = %err, "plan save failed; no changes applied");
                Err(err)
            }
        }
    }

    fn require_known_branches<'a>(
        &self,
        branch_ids: impl Iterator<Item = &'a BranchId>,
    ) -> Result<(), EngineError> {
        if !self.config.verify_branches {
            return Ok(());
        }
        let directory = self.directory.as_ref().ok_or_else(|| {
            EngineError::Config("verify_branches is set but no branch directory is attached".into())
        })?;
        let unknown: Vec<&str> = branch_ids
            .filter(|b| !directory.contains(b))
            .map(BranchId::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(EngineError::BranchNotFound(unknown.join(", ")))
        }
    }
}

fn reject_invalid(
    operation: &'static str,
    plan_id: Option<PlanId>,
    errors: ValidationErrors,
) -> Result<(), EngineError> {
    if errors.is_empty() {
        return Ok(());
    }
    match plan_id {
        Some(plan_id) => warn!(%plan_id, operation, %errors, "rejected invalid request"),
        None => warn!(operation, %errors, "rejected invalid request"),
    }
    Err(EngineError::Validation(errors))
}
