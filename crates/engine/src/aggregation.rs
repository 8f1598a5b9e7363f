//! Read-only summary queries over a plan aggregate, for listing rows and
//! summary cards. Activity is always the effective flag from resolution.

use std::collections::BTreeSet;

use branchplan_core::{BranchId, PlanAggregate, PlanId, ResolvedView, resolve, resolve::effective_is_active};
use serde::Serialize;

use crate::directory::{BranchDirectory, BranchMetadata};

/// Overrides whose effective `isActive` is true.
pub fn override_count(aggregate: &PlanAggregate) -> usize {
    aggregate
        .overrides()
        .filter(|ov| effective_is_active(aggregate, &ov.branch_id))
        .count()
}

/// Overrides whose effective `isActive` is false.
pub fn paused_override_count(aggregate: &PlanAggregate) -> usize {
    aggregate.override_len() - override_count(aggregate)
}

/// Assigned branches the directory knows, in branch-id order. Unknown ids
/// are dropped.
pub fn assigned_branches<D>(aggregate: &PlanAggregate, directory: &D) -> Vec<BranchMetadata>
where
    D: BranchDirectory + ?Sized,
{
    aggregate
        .template()
        .assigned_branch_ids
        .iter()
        .filter_map(|b| directory.resolve(b))
        .collect()
}

/// Branches that currently carry an override, active or paused.
pub fn branches_with_override(aggregate: &PlanAggregate) -> BTreeSet<BranchId> {
    aggregate.overrides().map(|ov| ov.branch_id.clone()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_id: PlanId,
    pub override_count: usize,
    pub paused_override_count: usize,
    pub assigned_branches: Vec<BranchMetadata>,
    pub branches_with_override: BTreeSet<BranchId>,
}

pub fn summarize<D>(aggregate: &PlanAggregate, directory: &D) -> PlanSummary
where
    D: BranchDirectory + ?Sized,
{
    let active = override_count(aggregate);
    PlanSummary {
        plan_id: aggregate.plan_id(),
        override_count: active,
        paused_override_count: aggregate.override_len() - active,
        assigned_branches: assigned_branches(aggregate, directory),
        branches_with_override: branches_with_override(aggregate),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRow {
    pub branch: BranchMetadata,
    pub plan: ResolvedView,
}

/// One resolved row per assigned branch known to the directory.
pub fn listing<D>(aggregate: &PlanAggregate, directory: &D) -> Vec<ListingRow>
where
    D: BranchDirectory + ?Sized,
{
    assigned_branches(aggregate, directory)
        .into_iter()
        .map(|branch| {
            let plan = resolve(aggregate, Some(&branch.branch_id));
            ListingRow { branch, plan }
        })
        .collect()
}

/// The queries above bound to one injected directory.
pub struct AggregationService<D> {
    directory: D,
}

impl<D: BranchDirectory> AggregationService<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn override_count(&self, aggregate: &PlanAggregate) -> usize {
        override_count(aggregate)
    }

    pub fn paused_override_count(&self, aggregate: &PlanAggregate) -> usize {
        paused_override_count(aggregate)
    }

    pub fn assigned_branches(&self, aggregate: &PlanAggregate) -> Vec<BranchMetadata> {
        assigned_branches(aggregate, &self.directory)
    }

    pub fn branches_with_override(&self, aggregate: &PlanAggregate) -> BTreeSet<BranchId> {
        branches_with_override(aggregate)
    }

    pub fn summarize(&self, aggregate: &PlanAggregate) -> PlanSummary {
        summarize(aggregate, &self.directory)
    }

    pub fn listing(&self, aggregate: &PlanAggregate) -> Vec<ListingRow> {
        listing(aggregate, &self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use branchplan_core::{Money, OverrideFields, Patch, PlanTemplate, TemplateFields};

    fn plan(branches: &[&str]) -> PlanAggregate {
        PlanAggregate::new(PlanTemplate {
            plan_id: PlanId::new(),
            fields: TemplateFields {
                name: "Gold".into(),
                description: None,
                price: Money::new(500_000, "VND"),
                duration_in_months: 1,
                benefits: vec![],
                is_active: true,
            },
            assigned_branch_ids: branches.iter().map(|b| BranchId::from(*b)).collect(),
        })
    }

    fn paused() -> OverrideFields {
        OverrideFields {
            is_active: Patch::Set(false),
            ..Default::default()
        }
    }

    #[test]
    fn counts_split_on_effective_activity() {
        let mut agg = plan(&["B1", "B2", "B3"]);
        agg.put_override(
            "B1".into(),
            OverrideFields {
                price: Patch::Set(Money::new(450_000, "VND")),
                ..Default::default()
            },
        );
        agg.put_override(
            "B2".into(),
            OverrideFields {
                is_active: Patch::Set(true),
                ..Default::default()
            },
        );
        agg.put_override("B3".into(), paused());

        assert_eq!(override_count(&agg), 2);
        assert_eq!(paused_override_count(&agg), 1);
    }

    #[test]
    fn inherited_activity_follows_paused_template() {
        let mut agg = plan(&["B1", "B2"]);
        let mut fields = agg.template().fields.clone();
        fields.is_active = false;
        agg.set_template_fields(fields);
        agg.put_override("B1".into(), OverrideFields::default());
        agg.put_override(
            "B2".into(),
            OverrideFields {
                is_active: Patch::Set(true),
                ..Default::default()
            },
        );
        assert_eq!(override_count(&agg), 1);
        assert_eq!(paused_override_count(&agg), 1);
    }

    #[test]
    fn assigned_branches_drops_unknown_ids() {
        let agg = plan(&["B1", "B2", "B9"]);
        let dir = StaticDirectory::new()
            .with_branch("B1", "District 1")
            .with_branch("B2", "District 2");
        let names: Vec<String> = assigned_branches(&agg, &dir).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["District 1", "District 2"]);
    }

    #[test]
    fn branches_with_override_ignores_activity() {
        let mut agg = plan(&["B1", "B2"]);
        agg.put_override("B2".into(), paused());
        agg.put_override("B7".into(), OverrideFields::default());
        let expected: BTreeSet<BranchId> = ["B2", "B7"].into_iter().map(BranchId::from).collect();
        assert_eq!(branches_with_override(&agg), expected);
    }

    #[test]
    fn listing_resolves_each_known_branch() {
        let mut agg = plan(&["B1", "B2", "B9"]);
        agg.put_override(
            "B1".into(),
            OverrideFields {
                price: Patch::Set(Money::new(450_000, "VND")),
                ..Default::default()
            },
        );
        let dir = StaticDirectory::new()
            .with_branch("B1", "District 1")
            .with_branch("B2", "District 2");
        let rows = listing(&agg, &dir);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].plan.price.amount, 450_000);
        assert!(rows[0].plan.has_override);
        assert_eq!(rows[1].plan.price.amount, 500_000);
        assert!(!rows[1].plan.has_override);

        let summary = summarize(&agg, &dir);
        assert_eq!(summary.override_count, 1);
        assert_eq!(summary.paused_override_count, 0);
        assert_eq!(summary.assigned_branches.len(), 2);
    }
}
