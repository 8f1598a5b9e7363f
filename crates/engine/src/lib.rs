pub mod aggregation;
pub mod config;
pub mod directory;
pub mod error;
pub mod manager;
pub mod request;
pub mod telemetry;

pub use aggregation::{AggregationService, ListingRow, PlanSummary};
pub use config::{EngineConfig, LogFormat, LoggingConfig, OrphanOverridePolicy, OutOfScopeReads};
pub use directory::{BranchDirectory, BranchMetadata, StaticDirectory};
pub use error::EngineError;
pub use manager::OverrideManager;
pub use request::{BatchRequest, CreatePlan, PlanPatch};
