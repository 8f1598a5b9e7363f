use std::collections::BTreeSet;

use branchplan_core::{BranchId, OverrideFields, TemplateFields};
use serde::{Deserialize, Serialize};

/// `POST plan`: template fields plus the branches it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlan {
    #[serde(flatten)]
    pub fields: TemplateFields,
    pub assigned_branch_ids: BTreeSet<BranchId>,
}

/// Branch-scope batch: replace the override on every target branch with
/// `override_fields`, and drop the override on every revert branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub target_branch_ids: BTreeSet<BranchId>,
    #[serde(default, rename = "data", skip_serializing_if = "Option::is_none")]
    pub override_fields: Option<OverrideFields>,
    #[serde(default)]
    pub revert_branch_ids: BTreeSet<BranchId>,
}

impl BatchRequest {
    pub fn apply<I, B>(targets: I, fields: OverrideFields) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BranchId>,
    {
        Self {
            target_branch_ids: targets.into_iter().map(Into::into).collect(),
            override_fields: Some(fields),
            revert_branch_ids: BTreeSet::new(),
        }
    }

    pub fn revert<I, B>(branches: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BranchId>,
    {
        Self {
            revert_branch_ids: branches.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn and_revert<I, B>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BranchId>,
    {
        self.revert_branch_ids.extend(branches.into_iter().map(Into::into));
        self
    }
}

/// `PATCH plan`, discriminated by `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum PlanPatch {
    Template { data: TemplateFields },
    Branches(BatchRequest),
}

impl PlanPatch {
    pub fn scope(&self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Branches(_) => "branches",
        }
    }
}
