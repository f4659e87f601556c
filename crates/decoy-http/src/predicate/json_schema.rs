//! JSON Schema validation for schema-valued strings and `JSON_SCHEMA` bodies.

use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;

/// A single schema validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// JSON pointer to the failing instance location
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema failed to compile: {0}")]
    Compile(String),
}

/// A compiled JSON Schema.
pub struct JsonSchemaValidator {
    schema: Value,
    compiled: JSONSchema,
    /// OpenAPI-style `"nullable": true`; a null instance is accepted
    nullable: bool,
    expects_string: bool,
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

impl JsonSchemaValidator {
    pub fn compile(schema_text: &str) -> Result<Self, SchemaError> {
        let schema: Value = serde_json::from_str(schema_text)?;
        Self::compile_value(schema)
    }

    pub fn compile_value(schema: Value) -> Result<Self, SchemaError> {
        let compiled =
            JSONSchema::compile(&schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        let nullable = schema
            .get("nullable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let expects_string = match schema.get("type") {
            Some(Value::String(t)) => t == "string",
            Some(Value::Array(types)) => types.iter().any(|t| t == "string"),
            _ => false,
        };
        Ok(Self {
            schema,
            compiled,
            nullable,
            expects_string,
        })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        if instance.is_null() && self.nullable {
            return true;
        }
        self.compiled.is_valid(instance)
    }

    /// Validate and collect every failure.
    pub fn validate(&self, instance: &Value) -> Vec<SchemaViolation> {
        if instance.is_null() && self.nullable {
            return Vec::new();
        }
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| SchemaViolation {
                    path: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }

    /// Turn a raw header/query/path value into the JSON instance to validate.
    ///
    /// Empty values become `null`; values the schema expects as strings stay strings;
    /// anything else is parsed as JSON and falls back to a JSON string.
    pub fn coerce_candidate(&self, raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        if self.expects_string {
            return Value::String(raw.to_string());
        }
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_rejects_invalid_json() {
        assert!(matches!(
            JsonSchemaValidator::compile("{ nope"),
            Err(SchemaError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_collects_all_failures() {
        let validator = JsonSchemaValidator::compile(
            r#"{"type":"object","properties":{"id":{"type":"integer"},"name":{"type":"string"}},"required":["id","name"]}"#,
        )
        .unwrap();
        assert!(validator.validate(&json!({"id": 1, "name": "a"})).is_empty());

        let violations = validator.validate(&json!({"id": "x"}));
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.path == "/id"));
    }

    #[test]
    fn test_coerce_candidate() {
        let number = JsonSchemaValidator::compile(r#"{"type":"number"}"#).unwrap();
        assert_eq!(number.coerce_candidate("2.5"), json!(2.5));
        assert_eq!(number.coerce_candidate("abc"), json!("abc"));
        assert_eq!(number.coerce_candidate(""), Value::Null);

        let string = JsonSchemaValidator::compile(r#"{"type":"string"}"#).unwrap();
        assert_eq!(string.coerce_candidate("12"), json!("12"));
    }

    #[test]
    fn test_nullable_accepts_null() {
        let validator =
            JsonSchemaValidator::compile(r#"{"type":"integer","nullable":true}"#).unwrap();
        assert!(validator.is_valid(&Value::Null));
        assert!(validator.validate(&Value::Null).is_empty());
    }
}
