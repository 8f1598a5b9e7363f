use std::collections::BTreeSet;

use serde::Serialize;

use crate::ids::{BranchId, PlanId};
use crate::money::Money;
use crate::plan::{PlanAggregate, PlanField};

/// The effective plan for one branch (or the bare template when no branch
/// is given). Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedView {
    pub plan_id: PlanId,
    pub branch_id: Option<BranchId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub duration_in_months: u32,
    pub benefits: Vec<String>,
    pub is_active: bool,
    pub assigned_branch_ids: BTreeSet<BranchId>,
    pub has_override: bool,
    /// Fields whose value came from the branch override.
    pub overridden_fields: Vec<PlanField>,
}

impl ResolvedView {
    pub fn is_overridden(&self, field: PlanField) -> bool {
        self.overridden_fields.contains(&field)
    }
}

/// Merge the template with the override for `branch_id`, field by field.
///
/// No membership check against `assigned_branch_ids` happens here: a branch
/// without an override simply sees the template.
pub fn resolve(aggregate: &PlanAggregate, branch_id: Option<&BranchId>) -> ResolvedView {
    let template = aggregate.template();
    let base = &template.fields;
    let ov = branch_id.and_then(|b| aggregate.override_for(b));

    let mut view = ResolvedView {
        plan_id: template.plan_id,
        branch_id: branch_id.cloned(),
        name: base.name.clone(),
        description: base.description.clone(),
        price: base.price.clone(),
        duration_in_months: base.duration_in_months,
        benefits: base.benefits.clone(),
        is_active: base.is_active,
        assigned_branch_ids: template.assigned_branch_ids.clone(),
        has_override: ov.is_some(),
        overridden_fields: Vec::new(),
    };

    if let Some(ov) = ov {
        let f = &ov.fields;
        view.name = f.name.resolve_or(&base.name);
        view.description = f.description.resolve_or(&base.description);
        view.price = f.price.resolve_or(&base.price);
        view.duration_in_months = f.duration_in_months.resolve_or(&base.duration_in_months);
        view.benefits = f.benefits.resolve_or(&base.benefits);
        view.is_active = f.is_active.resolve_or(&base.is_active);
        view.overridden_fields = f.set_fields();
    }

    view
}

/// Effective activity flag for a branch without building the whole view.
pub fn effective_is_active(aggregate: &PlanAggregate, branch_id: &BranchId) -> bool {
    let base = aggregate.template().fields.is_active;
    aggregate
        .override_for(branch_id)
        .map(|ov| ov.fields.is_active.resolve_or(&base))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;
    use crate::plan::{OverrideFields, PlanTemplate, TemplateFields};

    fn gold() -> PlanAggregate {
        PlanAggregate::new(PlanTemplate {
            plan_id: PlanId::new(),
            fields: TemplateFields {
                name: "Gold".into(),
                description: Some("All access".into()),
                price: Money::new(500_000, "VND"),
                duration_in_months: 1,
                benefits: vec!["Pool".into(), "Sauna".into()],
                is_active: true,
            },
            assigned_branch_ids: ["B1", "B2"].into_iter().map(BranchId::from).collect(),
        })
    }

    #[test]
    fn no_branch_returns_template() {
        let agg = gold();
        let view = resolve(&agg, None);
        assert_eq!(view.branch_id, None);
        assert_eq!(view.name, "Gold");
        assert_eq!(view.price, Money::new(500_000, "VND"));
        assert!(!view.has_override);
        assert!(view.overridden_fields.is_empty());
    }

    #[test]
    fn branch_without_override_matches_template() {
        let mut agg = gold();
        agg.put_override(
            "B2".into(),
            OverrideFields {
                name: Patch::Set("Gold B2".into()),
                ..Default::default()
            },
        );
        // Unassigned branch ids are resolved permissively.
        for branch in ["B1", "B9"] {
            let b = BranchId::from(branch);
            let view = resolve(&agg, Some(&b));
            let base = resolve(&agg, None);
            assert_eq!(view.branch_id, Some(b));
            assert_eq!(ResolvedView { branch_id: None, ..view }, base);
        }
    }

    #[test]
    fn price_only_override_keeps_other_fields() {
        let mut agg = gold();
        agg.put_override(
            "B1".into(),
            OverrideFields {
                price: Patch::Set(Money::new(450_000, "VND")),
                ..Default::default()
            },
        );
        let view = resolve(&agg, Some(&"B1".into()));
        assert_eq!(view.price.amount, 450_000);
        assert_eq!(view.name, "Gold");
        assert_eq!(view.description.as_deref(), Some("All access"));
        assert_eq!(view.duration_in_months, 1);
        assert_eq!(view.benefits, vec!["Pool", "Sauna"]);
        assert!(view.is_active);
        assert!(view.has_override);
        assert_eq!(view.overridden_fields, vec![PlanField::Price]);
    }

    #[test]
    fn explicit_falsy_values_win() {
        let mut agg = gold();
        agg.put_override(
            "B1".into(),
            OverrideFields {
                description: Patch::Set(None),
                benefits: Patch::Set(vec![]),
                is_active: Patch::Set(false),
                ..Default::default()
            },
        );
        let b1 = BranchId::from("B1");
        let view = resolve(&agg, Some(&b1));
        assert_eq!(view.description, None);
        assert!(view.benefits.is_empty());
        assert!(!view.is_active);
        assert!(!effective_is_active(&agg, &b1));
        assert!(effective_is_active(&agg, &"B2".into()));
    }
}
