//! Stateless field- and request-level validators.
//!
//! Every validator reports into a [`ValidationErrors`] map keyed by the
//! wire field name; the caller decides whether to abort or surface it.
//! Validators that take `&mut` also normalise their input (trimming and
//! dropping blank benefit entries) so the stored value is the checked one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::ids::BranchId;
use crate::money::{Money, is_currency_code};
use crate::patch::Patch;
use crate::plan::{Override, OverrideFields, PlanField, TemplateFields};

pub const TARGET_BRANCHES_KEY: &str = "targetBranchIds";
pub const REVERT_BRANCHES_KEY: &str = "revertBranchIds";
pub const ASSIGNED_BRANCHES_KEY: &str = "assignedBranchIds";
pub const DATA_KEY: &str = "data";
pub const REQUEST_KEY: &str = "request";

pub const NO_CHANGES_REQUESTED: &str = "no changes requested";

pub const DEFAULT_MAX_BENEFITS: usize = 50;

/// Field name -> message. One message per field; the first one reported wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_benefits: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_benefits: DEFAULT_MAX_BENEFITS,
        }
    }
}

pub fn check_name(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        Some("is required".into())
    } else {
        None
    }
}

pub fn check_price(price: &Money) -> Option<String> {
    if !is_currency_code(&price.currency) {
        Some(format!("unknown currency code {:?}", price.currency))
    } else if !price.is_positive() {
        Some("must be greater than 0".into())
    } else {
        None
    }
}

pub fn check_duration(months: u32) -> Option<String> {
    if months == 0 {
        Some("must be a whole number of months greater than 0".into())
    } else {
        None
    }
}

/// Trim every entry and drop the blank ones.
pub fn normalize_benefits(benefits: Vec<String>) -> Vec<String> {
    benefits
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn check_benefit_count(benefits: &[String], limits: &Limits) -> Option<String> {
    if benefits.len() > limits.max_benefits {
        Some(format!("at most {} entries allowed", limits.max_benefits))
    } else {
        None
    }
}

fn report(errors: &mut ValidationErrors, field: PlanField, message: Option<String>) {
    if let Some(message) = message {
        errors.add(field.as_str(), message);
    }
}

/// Validate and normalise a full set of template fields.
pub fn validate_template(fields: &mut TemplateFields, limits: &Limits) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    fields.name = fields.name.trim().to_string();
    fields.description = normalize_description(fields.description.take());
    fields.benefits = normalize_benefits(std::mem::take(&mut fields.benefits));

    report(&mut errors, PlanField::Name, check_name(&fields.name));
    report(&mut errors, PlanField::Price, check_price(&fields.price));
    report(&mut errors, PlanField::DurationInMonths, check_duration(fields.duration_in_months));
    report(&mut errors, PlanField::Benefits, check_benefit_count(&fields.benefits, limits));
    errors
}

/// Validate and normalise the explicitly set slots of an override. Inherited
/// slots are not checked; the template already satisfied the rules.
pub fn validate_override(
    fields: &mut OverrideFields,
    template: &TemplateFields,
    limits: &Limits,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if let Patch::Set(name) = fields.name.as_mut() {
        *name = name.trim().to_string();
        report(&mut errors, PlanField::Name, check_name(name));
    }
    if let Patch::Set(description) = fields.description.as_mut() {
        *description = normalize_description(description.take());
    }
    if let Patch::Set(price) = fields.price.as_ref() {
        let message = check_price(price).or_else(|| {
            (!price.same_currency(&template.price)).then(|| {
                format!("currency must match the template ({})", template.price.currency)
            })
        });
        report(&mut errors, PlanField::Price, message);
    }
    if let Patch::Set(months) = fields.duration_in_months.as_ref() {
        report(&mut errors, PlanField::DurationInMonths, check_duration(*months));
    }
    if let Patch::Set(benefits) = fields.benefits.as_mut() {
        *benefits = normalize_benefits(std::mem::take(benefits));
        report(&mut errors, PlanField::Benefits, check_benefit_count(benefits, limits));
    }
    errors
}

/// A template price change must keep the currency of every override that
/// sets its own price.
pub fn validate_override_currencies<'a>(
    price: &Money,
    overrides: impl IntoIterator<Item = &'a Override>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mismatched: Vec<&str> = overrides
        .into_iter()
        .filter(|o| matches!(o.fields.price.as_ref(), Patch::Set(p) if !p.same_currency(price)))
        .map(|o| o.branch_id.as_str())
        .collect();
    if !mismatched.is_empty() {
        report(
            &mut errors,
            PlanField::Price,
            Some(format!(
                "currency {} differs from overrides on {}",
                price.currency,
                mismatched.join(", ")
            )),
        );
    }
    errors
}

fn check_branch_ids(ids: &BTreeSet<BranchId>) -> Option<String> {
    if ids.iter().any(|b| b.as_str().trim().is_empty()) {
        Some("contains an empty branch id".into())
    } else {
        None
    }
}

/// A template must apply to at least one branch.
pub fn validate_assigned_branches(ids: &BTreeSet<BranchId>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if ids.is_empty() {
        errors.add(ASSIGNED_BRANCHES_KEY, "at least one branch is required");
    } else if let Some(message) = check_branch_ids(ids) {
        errors.add(ASSIGNED_BRANCHES_KEY, message);
    }
    errors
}

/// Shape of a branch-scope batch: disjoint target/revert sets, at least one
/// non-empty, and override data whenever branches are targeted.
pub fn validate_batch_shape(
    targets: &BTreeSet<BranchId>,
    reverts: &BTreeSet<BranchId>,
    has_data: bool,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if targets.is_empty() && reverts.is_empty() {
        errors.add(REQUEST_KEY, NO_CHANGES_REQUESTED);
        return errors;
    }

    let overlap: Vec<&str> = targets.intersection(reverts).map(BranchId::as_str).collect();
    if !overlap.is_empty() {
        errors.add(
            REVERT_BRANCHES_KEY,
            format!(
                "must be disjoint from {TARGET_BRANCHES_KEY}; both contain {}",
                overlap.join(", ")
            ),
        );
    }
    if let Some(message) = check_branch_ids(targets) {
        errors.add(TARGET_BRANCHES_KEY, message);
    }
    if let Some(message) = check_branch_ids(reverts) {
        errors.add(REVERT_BRANCHES_KEY, message);
    }
    if !targets.is_empty() && !has_data {
        errors.add(DATA_KEY, "override fields are required when targeting branches");
    }
    errors
}
