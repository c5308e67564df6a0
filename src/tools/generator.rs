//! Dynamic Tool Generator.
//!
//! Builds one runtime-validated write tool per configured table. Every
//! generated tool implements the uniform [`DynamicTool`] capability
//! interface; callers never depend on a concrete per-category type.
//! Generation registers each configured table with the gatekeeper before
//! any tool is handed out, so a tool is never usable against an
//! unregistered table.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::gatekeeper::ExecutionGatekeeper;
use super::validator::{FieldValidator, ValidatorCache};
use crate::catalogue::{FieldDefinition, FieldType, MetricDefinition};
use crate::error::{CatalogueError, CatalogueResult};
use crate::planner::{validate_column_name, validate_table_name};
use crate::store::{CatalogueStore, JournalRow};

/// Configuration for one generated tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub tool_id: String,
    pub table_name: String,
    pub display_name: String,
    pub description: String,
    pub fields: Vec<FieldDefinition>,
    /// Logical field name to physical column name. Unmapped fields write
    /// to the column of the same name.
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
}

impl TableConfig {
    /// Conventional configuration for one catalogue metric.
    pub fn from_metric(metric: &MetricDefinition) -> Self {
        Self {
            tool_id: format!("log-{}", metric.slug),
            table_name: metric.table_name(),
            display_name: metric.display_name.clone(),
            description: format!("Record a {} journal entry", metric.display_name),
            fields: metric.fields.clone(),
            column_mappings: BTreeMap::new(),
        }
    }
}

/// Structured result of one tool invocation. Validation problems are
/// returned, never raised, so agent-style callers can recover.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolExecution {
    Recorded {
        table: String,
        entry_id: Uuid,
    },
    Invalid {
        code: &'static str,
        violations: Vec<String>,
    },
    Failed {
        code: &'static str,
        message: String,
    },
}

/// Uniform capability interface implemented by every generated tool.
#[async_trait]
pub trait DynamicTool: Send + Sync {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Value;
    async fn execute(&self, input: &Value) -> ToolExecution;
}

/// The one concrete tool shape: validate, remap, delegate to the gatekeeper.
struct DataEntryTool<S> {
    id: String,
    description: String,
    input_schema: Value,
    table: String,
    actor_id: String,
    column_mappings: BTreeMap<String, String>,
    validator: Arc<FieldValidator>,
    gatekeeper: Arc<ExecutionGatekeeper<S>>,
}

#[async_trait]
impl<S: CatalogueStore + 'static> DynamicTool for DataEntryTool<S> {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn execute(&self, input: &Value) -> ToolExecution {
        let values = match self.validator.validate(input) {
            Ok(values) => values,
            Err(violations) => {
                return ToolExecution::Invalid {
                    code: "VALIDATION_ERROR",
                    violations,
                }
            }
        };

        let mut row = JournalRow::new();
        for (field, value) in values {
            let column = self
                .column_mappings
                .get(&field)
                .cloned()
                .unwrap_or(field);
            row.insert(column, value);
        }

        match self.gatekeeper.write(&self.table, &self.actor_id, &row).await {
            Ok(entry_id) => ToolExecution::Recorded {
                table: self.table.clone(),
                entry_id,
            },
            Err(err) => ToolExecution::Failed {
                code: "UNKNOWN_ERROR",
                message: err.to_string(),
            },
        }
    }
}

/// Generates tools over a shared gatekeeper and validator cache.
pub struct ToolGenerator<S> {
    gatekeeper: Arc<ExecutionGatekeeper<S>>,
    cache: Arc<ValidatorCache>,
}

impl<S: CatalogueStore + 'static> ToolGenerator<S> {
    pub fn new(gatekeeper: Arc<ExecutionGatekeeper<S>>, cache: Arc<ValidatorCache>) -> Self {
        Self { gatekeeper, cache }
    }

    /// Build one tool per configuration.
    ///
    /// A duplicate tool id or an invalid configuration fails the whole
    /// call before any tool is produced or any table registered.
    pub fn generate(&self, configs: &[TableConfig]) -> CatalogueResult<Vec<Arc<dyn DynamicTool>>> {
        let mut seen = HashSet::new();
        for config in configs {
            if !seen.insert(config.tool_id.as_str()) {
                return Err(CatalogueError::validation(
                    format!("tool '{}'", config.tool_id),
                    "duplicate tool id in one configuration",
                ));
            }
            validate_config(config)?;
        }

        let mut tools: Vec<Arc<dyn DynamicTool>> = Vec::with_capacity(configs.len());
        for config in configs {
            // Registration precedes tool construction: a tool must never
            // exist for an unregistered table.
            self.gatekeeper.add_allowed_table(&config.table_name)?;
            let validator = self.cache.get_or_derive(&config.tool_id, &config.fields);
            tools.push(Arc::new(DataEntryTool {
                id: config.tool_id.clone(),
                description: config.description.clone(),
                input_schema: input_schema(config),
                table: config.table_name.clone(),
                actor_id: format!("tool:{}", config.tool_id),
                column_mappings: config.column_mappings.clone(),
                validator,
                gatekeeper: self.gatekeeper.clone(),
            }));
        }
        Ok(tools)
    }
}

fn validate_config(config: &TableConfig) -> CatalogueResult<()> {
    validate_table_name(&config.table_name)?;
    if config.fields.is_empty() {
        return Err(CatalogueError::validation(
            format!("tool '{}'", config.tool_id),
            "at least one field is required",
        ));
    }

    let mut columns = HashSet::new();
    for field in &config.fields {
        field.validate()?;
        let column = config
            .column_mappings
            .get(&field.name)
            .map(String::as_str)
            .unwrap_or(&field.name);
        validate_column_name(column)?;
        if !columns.insert(column.to_string()) {
            return Err(CatalogueError::validation(
                format!("tool '{}'", config.tool_id),
                format!("two fields map to column '{column}'"),
            ));
        }
    }
    Ok(())
}

/// JSON schema describing a tool's expected input.
fn input_schema(config: &TableConfig) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for field in &config.fields {
        let mut property = serde_json::Map::new();
        property.insert("type".to_string(), json!(field.data_type.json_type()));

        let description = match &field.unit {
            Some(unit) => format!("{} ({unit})", field.label),
            None => field.label.clone(),
        };
        property.insert("description".to_string(), json!(description));

        if let Some(values) = &field.enum_values {
            property.insert("enum".to_string(), json!(values));
        }
        if field.data_type == FieldType::DateTime {
            property.insert("format".to_string(), json!("date-time"));
        }
        if let Some(example) = &field.example {
            property.insert("examples".to_string(), json!([example]));
        }

        if field.required {
            required.push(field.name.clone());
        }
        properties.insert(field.name.clone(), Value::Object(property));
    }

    json!({
        "type": "object",
        "title": config.display_name,
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn generator() -> (ToolGenerator<MemoryStore>, Arc<ExecutionGatekeeper<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let gatekeeper = Arc::new(ExecutionGatekeeper::new(store));
        let cache = Arc::new(ValidatorCache::new());
        (ToolGenerator::new(gatekeeper.clone(), cache), gatekeeper)
    }

    fn mood_config(tool_id: &str) -> TableConfig {
        TableConfig {
            tool_id: tool_id.to_string(),
            table_name: "journal_mood".to_string(),
            display_name: "Mood".to_string(),
            description: "Record a mood entry".to_string(),
            fields: vec![FieldDefinition::new(
                "rating",
                "Mood rating",
                FieldType::Integer,
            )],
            column_mappings: BTreeMap::new(),
        }
    }

    #[test]
    fn test_duplicate_tool_id_rejected_before_any_tool() {
        let (generator, gatekeeper) = generator();
        let err = match generator.generate(&[mood_config("log-mood"), mood_config("log-mood")]) {
            Ok(_) => panic!("expected generate to fail on duplicate tool ids"),
            Err(err) => err,
        };
        assert_eq!(err.code(), "VALIDATION_ERROR");
        // Nothing was registered either.
        assert!(gatekeeper.allowed_tables().is_empty());
    }

    #[test]
    fn test_generation_registers_table() {
        let (generator, gatekeeper) = generator();
        let tools = generator.generate(&[mood_config("log-mood")]).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].id(), "log-mood");
        assert!(gatekeeper.is_allowed("journal_mood"));
    }

    #[test]
    fn test_input_schema_shape() {
        let (generator, _) = generator();
        let mut config = mood_config("log-mood");
        config.fields.push(
            FieldDefinition::new("quality", "Quality", FieldType::Enum)
                .with_enum_values(["poor", "good"])
                .optional(),
        );
        let tools = generator.generate(&[config]).unwrap();
        let schema = tools[0].input_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["rating"]["type"], "integer");
        assert_eq!(schema["properties"]["quality"]["enum"][0], "poor");
        assert_eq!(schema["required"], json!(["rating"]));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn test_colliding_column_mappings_rejected() {
        let (generator, _) = generator();
        let mut config = mood_config("log-mood");
        config
            .fields
            .push(FieldDefinition::new("score", "Score", FieldType::Integer));
        config
            .column_mappings
            .insert("score".to_string(), "rating".to_string());
        let err = match generator.generate(&[config]) {
            Ok(_) => panic!("expected generate to fail validation"),
            Err(err) => err,
        };
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_config_from_metric() {
        let parser = crate::parser::CatalogueParser::new();
        let catalogue = parser.parse("Track water intake in ml", None, None);
        let config = TableConfig::from_metric(catalogue.metric("water-intake").unwrap());
        assert_eq!(config.tool_id, "log-water-intake");
        assert_eq!(config.table_name, "journal_water_intake");
    }
}
