//! Dynamic data-entry tools.
//!
//! The generator turns table configurations into runtime-validated write
//! tools; the gatekeeper is the single path through which those tools
//! persist anything. Validators are memoized per tool id in an explicit
//! cache registry constructed at startup.

pub mod gatekeeper;
pub mod generator;
pub mod validator;

pub use gatekeeper::ExecutionGatekeeper;
pub use generator::{DynamicTool, TableConfig, ToolExecution, ToolGenerator};
pub use validator::{FieldValidator, ValidatorCache};
