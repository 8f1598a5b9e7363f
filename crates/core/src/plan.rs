use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{BranchId, PlanId};
use crate::money::Money;
use crate::patch::Patch;

/// Field names shared by templates, overrides, resolved views and
/// validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanField {
    Name,
    Description,
    Price,
    DurationInMonths,
    Benefits,
    IsActive,
}

impl PlanField {
    pub const ALL: [PlanField; 6] = [
        Self::Name,
        Self::Description,
        Self::Price,
        Self::DurationInMonths,
        Self::Benefits,
        Self::IsActive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::DurationInMonths => "durationInMonths",
            Self::Benefits => "benefits",
            Self::IsActive => "isActive",
        }
    }
}

fn default_active() -> bool {
    true
}

/// The scalar part of a template. `assigned_branch_ids` lives on
/// [`PlanTemplate`] because it is edited through a separate operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub duration_in_months: u32,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTemplate {
    pub plan_id: PlanId,
    #[serde(flatten)]
    pub fields: TemplateFields,
    pub assigned_branch_ids: BTreeSet<BranchId>,
}

/// Per-branch patch over [`TemplateFields`]. Every slot is independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideFields {
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub description: Patch<Option<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub price: Patch<Money>,
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub duration_in_months: Patch<u32>,
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub benefits: Patch<Vec<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_inherit")]
    pub is_active: Patch<bool>,
}

impl OverrideFields {
    pub fn is_field_set(&self, field: PlanField) -> bool {
        match field {
            PlanField::Name => self.name.is_set(),
            PlanField::Description => self.description.is_set(),
            PlanField::Price => self.price.is_set(),
            PlanField::DurationInMonths => self.duration_in_months.is_set(),
            PlanField::Benefits => self.benefits.is_set(),
            PlanField::IsActive => self.is_active.is_set(),
        }
    }

    /// Fields carrying an explicit value, in declaration order.
    pub fn set_fields(&self) -> Vec<PlanField> {
        PlanField::ALL
            .into_iter()
            .filter(|f| self.is_field_set(*f))
            .collect()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub plan_id: PlanId,
    pub branch_id: BranchId,
    #[serde(flatten)]
    pub fields: OverrideFields,
}

/// A template plus its overrides: the unit of storage and of atomic mutation.
///
/// Overrides are keyed by branch, so at most one exists per branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanAggregate {
    template: PlanTemplate,
    overrides: BTreeMap<BranchId, Override>,
    version: u64,
}

impl PlanAggregate {
    /// A freshly created plan: no overrides, version 1.
    pub fn new(template: PlanTemplate) -> Self {
        Self {
            template,
            overrides: BTreeMap::new(),
            version: 1,
        }
    }

    /// Rebuild from stored rows, rejecting duplicate or foreign overrides.
    pub fn from_parts(
        template: PlanTemplate,
        overrides: Vec<Override>,
        version: u64,
    ) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for ov in overrides {
            if ov.plan_id != template.plan_id {
                return Err(CoreError::InvalidData(format!(
                    "override for branch {} belongs to plan {}, not {}",
                    ov.branch_id, ov.plan_id, template.plan_id
                )));
            }
            let branch_id = ov.branch_id.clone();
            if map.insert(branch_id.clone(), ov).is_some() {
                return Err(CoreError::DuplicateOverride {
                    branch_id: branch_id.to_string(),
                });
            }
        }
        Ok(Self {
            template,
            overrides: map,
            version,
        })
    }

    pub fn plan_id(&self) -> PlanId {
        self.template.plan_id
    }

    pub fn template(&self) -> &PlanTemplate {
        &self.template
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Overrides in branch-id order.
    pub fn overrides(&self) -> impl Iterator<Item = &Override> {
        self.overrides.values()
    }

    pub fn override_for(&self, branch_id: &BranchId) -> Option<&Override> {
        self.overrides.get(branch_id)
    }

    pub fn has_override(&self, branch_id: &BranchId) -> bool {
        self.overrides.contains_key(branch_id)
    }

    pub fn override_len(&self) -> usize {
        self.overrides.len()
    }

    /// Create or fully replace the override for `branch_id`. Returns the
    /// replaced override, if any.
    pub fn put_override(&mut self, branch_id: BranchId, fields: OverrideFields) -> Option<Override> {
        let ov = Override {
            plan_id: self.template.plan_id,
            branch_id: branch_id.clone(),
            fields,
        };
        self.overrides.insert(branch_id, ov)
    }

    pub fn remove_override(&mut self, branch_id: &BranchId) -> Option<Override> {
        self.overrides.remove(branch_id)
    }

    pub fn set_template_fields(&mut self, fields: TemplateFields) {
        self.template.fields = fields;
    }

    pub fn set_assigned_branch_ids(&mut self, ids: BTreeSet<BranchId>) {
        self.template.assigned_branch_ids = ids;
    }
}
