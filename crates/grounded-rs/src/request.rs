//! JSON requests for the CLI: one observation plus the plan to apply to it.
//!
//! Requests are checked against the schema generated from
//! [`SummaryRequest`] before deserialization, so a malformed file is reported
//! field by field instead of as the first serde error.

use crate::error::{Result, SummarizeError};
use crate::observation::{GoalPlan, Observation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// `{ "observation": ..., "plan": ... }`. A missing plan means a page summary
/// with no stated goal.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
pub struct SummaryRequest {
    pub observation: Observation,
    #[serde(default)]
    pub plan: GoalPlan,
}

/// The request JSON schema.
pub fn request_schema() -> serde_json::Value {
    crate::json_schema_for::<SummaryRequest>()
}

impl SummaryRequest {
    pub fn new(observation: Observation, plan: GoalPlan) -> Self {
        Self { observation, plan }
    }

    /// Parse and schema-check a request.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SummarizeError::InvalidRequest(format!("invalid JSON: {e}")))?;

        let schema = request_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                let errors: Vec<String> = validator
                    .iter_errors(&value)
                    .map(|e| format!("  - {}: {e}", e.instance_path()))
                    .collect();
                if !errors.is_empty() {
                    return Err(SummarizeError::InvalidRequest(format!(
                        "schema validation failed:\n{}",
                        errors.join("\n")
                    )));
                }
            }
            Err(e) => debug!("Request schema did not compile, skipping validation: {e}"),
        }

        serde_json::from_value(value).map_err(|e| SummarizeError::InvalidRequest(e.to_string()))
    }

    /// Read and parse a request file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SummarizeError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}
