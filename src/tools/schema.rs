//! Payload schemas for tool definitions
//!
//! A schema is declared once per tool with a small builder. It is used twice:
//! rendered to JSON Schema for the tool catalog in the system prompt, and
//! checked against every incoming payload before the handler runs.

use serde_json::{json, Map, Value};

use super::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn json_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared payload field
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    ty: FieldType,
    description: &'static str,
    required: bool,
    allowed: Vec<Value>,
}

impl Field {
    pub fn new(name: &'static str, ty: FieldType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: false,
            allowed: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict the field to an enumerated set of values
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn allows(&self, value: &Value) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        self.allowed.iter().any(|allowed| match (allowed.as_f64(), value.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => allowed == value,
        })
    }

    fn to_json(&self) -> Value {
        let mut prop = json!({
            "type": self.ty.json_name(),
            "description": self.description,
        });
        if !self.allowed.is_empty() {
            prop["enum"] = Value::Array(self.allowed.clone());
        }
        prop
    }

    fn check(&self, value: Option<&Value>) -> Result<(), ToolError> {
        let value = match value {
            None | Some(Value::Null) if self.required => {
                return Err(ToolError::invalid_parameter(
                    self.name,
                    "missing required field",
                ));
            }
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        if !self.ty.matches(value) {
            return Err(ToolError::invalid_parameter(
                self.name,
                format!(
                    "expected {}, got {}",
                    self.ty.json_name(),
                    value_type_name(value)
                ),
            ));
        }

        if !self.allows(value) {
            let allowed: Vec<String> = self.allowed.iter().map(Value::to_string).collect();
            return Err(ToolError::invalid_parameter(
                self.name,
                format!("must be one of {} (got {})", allowed.join(", "), value),
            ));
        }
        Ok(())
    }
}

pub fn string_field(name: &'static str, description: &'static str) -> Field {
    Field::new(name, FieldType::String, description)
}

pub fn number_field(name: &'static str, description: &'static str) -> Field {
    Field::new(name, FieldType::Number, description)
}

pub fn integer_field(name: &'static str, description: &'static str) -> Field {
    Field::new(name, FieldType::Integer, description)
}

pub fn boolean_field(name: &'static str, description: &'static str) -> Field {
    Field::new(name, FieldType::Boolean, description)
}

pub fn object_field(name: &'static str, description: &'static str) -> Field {
    Field::new(name, FieldType::Object, description)
}

/// Build an object schema
pub fn object_schema() -> SchemaBuilder {
    SchemaBuilder::default()
}

/// Schema builder for tool definitions
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> ToolSchema {
        ToolSchema {
            fields: self.fields,
        }
    }
}

/// Declared payload shape of a tool
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    fields: Vec<Field>,
}

impl ToolSchema {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// JSON Schema rendering used in the tool catalog
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.to_json());
            if field.required {
                required.push(Value::from(field.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check fields in declaration order; the first bad field wins.
    /// Fields not declared here are ignored.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<(), ToolError> {
        for field in &self.fields {
            field.check(payload.get(field.name))?;
        }
        Ok(())
    }
}
