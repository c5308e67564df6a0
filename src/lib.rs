//! care-catalogue - admin-defined tracking catalogue core
//!
//! Lets a non-technical administrator describe, in free text, new categories
//! of structured data to track, and safely turns that description into
//! persisted schema additions plus runtime-validated data-entry tools.
//!
//! ## Pipeline
//! Admin text -> [`parser::CatalogueParser`] -> catalogue ->
//! [`planner::TableChangePlanner`] (+ schema snapshot) -> additive plan ->
//! [`executor::SchemaExecutor`] (atomic DDL, versioned rule set, audit
//! trail). Separately, catalogue fields -> [`tools::ToolGenerator`] ->
//! per-category tools -> [`tools::ExecutionGatekeeper`]-checked
//! parameterized writes.
//!
//! ## Quick start
//!
//! ```rust
//! use care_catalogue::parser::CatalogueParser;
//!
//! let parser = CatalogueParser::new();
//! let catalogue = parser.parse("Track water intake in ml, twice daily reminders", None, None);
//! assert_eq!(catalogue.metrics[0].slug, "water-intake");
//! ```

// Core error handling
pub mod error;

// Runtime configuration
pub mod config;

// Catalogue data model
pub mod catalogue;

// Heuristic free-text parser
pub mod parser;

// Additive-only schema planning
pub mod planner;

// Append-only audit events
pub mod audit;

// Store seam (in-memory always; PostgreSQL behind the database feature)
pub mod store;

// Transactional executor / audit recorder
pub mod executor;

// Dynamic tool generation and the write gatekeeper
pub mod tools;

// Public re-exports for the pipeline surface
pub use audit::{ActorType, AuditEvent};
pub use catalogue::{
    AdminRuleSet, EscalationPolicy, FieldDefinition, FieldType, MetricDefinition, ParsedCatalogue,
    ReminderPolicy, RetentionPolicy,
};
pub use config::{ConflictPolicy, CoreConfig};
pub use error::{CatalogueError, CatalogueResult, StoreError};
pub use executor::{ExecutionOutcome, ExecutionState, SchemaExecutor};
pub use parser::CatalogueParser;
pub use planner::{
    ColumnSpec, PlanOutcome, SchemaSnapshot, TableAction, TableActionPlan, TableChangePlanner,
};
pub use store::{CatalogueStore, ColumnValue, JournalRow, MemoryStore};
#[cfg(feature = "database")]
pub use store::PostgresStore;
pub use tools::{
    DynamicTool, ExecutionGatekeeper, FieldValidator, TableConfig, ToolExecution, ToolGenerator,
    ValidatorCache,
};
