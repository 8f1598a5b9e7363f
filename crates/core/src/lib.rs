pub mod error;
pub mod ids;
pub mod money;
pub mod patch;
pub mod plan;
pub mod resolve;
pub mod validation;

pub use error::CoreError;
pub use ids::*;
pub use money::Money;
pub use patch::Patch;
pub use plan::{Override, OverrideFields, PlanAggregate, PlanField, PlanTemplate, TemplateFields};
pub use resolve::{ResolvedView, resolve};
pub use validation::{Limits, ValidationErrors};
