//! Classification of raw expression values into typed, serializable results

use octofhir_cr_model::Value;
use octofhir_cr_model::fhir::Bundle;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Rendered value of an expression result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassifiedValue {
    /// Text form, or a `Type/id` summary reference
    Text(String),
    /// A single resource
    Resource(JsonValue),
    /// A resource collection
    Collection(Bundle),
}

impl ClassifiedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Classified value with its result type label
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub value: ClassifiedValue,
    pub result_type: String,
}

/// Classify a raw value.
///
/// The label depends only on the value's shape; `summary` only changes how
/// resources are rendered.
pub fn classify(value: &Value, summary: bool) -> Classification {
    match value {
        Value::Null => Classification {
            value: ClassifiedValue::Text("null".to_string()),
            result_type: "Null".to_string(),
        },
        Value::List(items) if matches!(items.first(), Some(Value::Resource(_))) => {
            let rendered = if summary {
                ClassifiedValue::Text(summary_reference(&items[0]))
            } else {
                let resources: Vec<JsonValue> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Resource(json) => Some(json.clone()),
                        _ => None,
                    })
                    .collect();
                let dropped = items.len() - resources.len();
                if dropped > 0 {
                    log::debug!(
                        "collection omits {} non-resource element(s) of {}",
                        dropped,
                        items.len()
                    );
                }
                ClassifiedValue::Collection(Bundle::collection(resources))
            };
            Classification {
                value: rendered,
                result_type: "List".to_string(),
            }
        }
        Value::List(_) => Classification {
            value: ClassifiedValue::Text(value.to_string()),
            result_type: "List".to_string(),
        },
        Value::Resource(json) => Classification {
            value: if summary {
                ClassifiedValue::Text(summary_reference(value))
            } else {
                ClassifiedValue::Resource(json.clone())
            },
            result_type: value.resource_type().unwrap_or("Resource").to_string(),
        },
        Value::Decimal(d) => Classification {
            value: ClassifiedValue::Text(d.to_string()),
            result_type: "Decimal".to_string(),
        },
        other => Classification {
            value: ClassifiedValue::Text(other.to_string()),
            result_type: other.type_name().to_string(),
        },
    }
}

fn summary_reference(resource: &Value) -> String {
    format!(
        "{}/{}",
        resource.resource_type().unwrap_or("Resource"),
        resource.resource_id().unwrap_or_default()
    )
}

/// Named result of one expression: a classified value or an error, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ClassifiedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExpressionResult {
    pub fn success(name: impl Into<String>, value: &Value, summary: bool) -> Self {
        let classification = classify(value, summary);
        Self {
            name: name.into(),
            value: Some(classification.value),
            result_type: Some(classification.result_type),
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            result_type: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
