//! Schema normalization for MCP tool descriptors.
//!
//! Servers are wildly inconsistent about where they put a tool's input
//! schema and what shape it has. This crate turns whatever a server sent
//! into a [`ToolSchema`] that the rest of the workspace can trust: the
//! extraction strategies run in a fixed order and the first one that
//! yields a schema object wins, then a cleanup pass guarantees the
//! `properties`/`required` invariants. Nothing in here ever fails; a
//! value we cannot make sense of becomes the empty schema.

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tooltalk_core::ToolSchema;
use tracing::{debug, warn};

/// Keys a schema object may be nested under when a server wraps it.
const NESTED_KEYS: [&str; 5] = [
    "inputSchema",
    "input_schema",
    "schema",
    "parameters",
    "parameter_schema",
];

/// Bookkeeping names some servers leak into `required`. They describe the
/// tool itself, not its parameters, and must never be demanded from users.
const RESERVED_NAMES: [&str; 5] = ["name", "inputSchema", "description", "schema", "annotations"];

type Strategy = fn(&Value) -> Option<Map<String, Value>>;

/// Extraction strategies, most specific first. Order matters: an object
/// that merely wraps the real schema must be unwrapped before the plain
/// object strategy would swallow it whole.
const STRATEGIES: [Strategy; 3] = [nested_object, plain_object, embedded_json];

/// Normalize a raw schema value into a [`ToolSchema`].
///
/// Runs the extraction strategies in order, then cleans the winner:
/// a missing or malformed `properties` becomes the empty map, a missing
/// or malformed `required` becomes the empty list, and reserved
/// bookkeeping names are dropped from `required`. Any other top-level
/// keys (`title`, `type`, ...) are preserved untouched.
pub fn normalize(raw: &Value) -> ToolSchema {
    let object = STRATEGIES.iter().find_map(|extract| extract(raw));
    if object.is_none() && !raw.is_null() {
        debug!("schema value has no usable shape, treating as empty");
    }
    clean(object.unwrap_or_default())
}

/// Normalize a schema produced by a fallible accessor.
///
/// Some descriptors expose their schema behind a call that can itself
/// fail (lazy loading, proxies). A failure there means the tool simply
/// has no parameters we can know about, so it is logged and swallowed.
pub fn normalize_with<F, E>(provider: F) -> ToolSchema
where
    F: FnOnce() -> Result<Value, E>,
    E: std::fmt::Display,
{
    match provider() {
        Ok(raw) => normalize(&raw),
        Err(err) => {
            warn!(error = %err, "schema accessor failed, treating schema as empty");
            ToolSchema::default()
        }
    }
}

/// Whether a raw value already satisfies the structural invariants:
/// a JSON object whose `properties` is an object and whose `required`,
/// if present, is an array.
pub fn validate_structure(raw: &Value) -> bool {
    let Some(object) = raw.as_object() else {
        return false;
    };
    if !object.get("properties").is_some_and(Value::is_object) {
        return false;
    }
    match object.get("required") {
        None => true,
        Some(required) => required.is_array(),
    }
}

/// The parameter names a caller must supply, in schema order.
pub fn required_params(schema: &ToolSchema) -> &[String] {
    &schema.required
}

/// Defaults declared on optional parameters, keyed by parameter name.
///
/// Required parameters are excluded even when they carry a `default`:
/// a required parameter is the user's to provide, never ours to invent.
pub fn optional_defaults(schema: &ToolSchema) -> Map<String, Value> {
    schema
        .properties
        .iter()
        .filter(|(name, _)| !schema.is_required(name))
        .filter_map(|(name, prop)| {
            prop.get("default")
                .map(|default| (name.clone(), default.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction strategies
// ---------------------------------------------------------------------------

/// An object without its own `properties` that nests a schema under one of
/// the well-known wrapper keys.
fn nested_object(raw: &Value) -> Option<Map<String, Value>> {
    let object = raw.as_object()?;
    if object.contains_key("properties") {
        return None;
    }
    NESTED_KEYS.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_object)
            .filter(|inner| inner.contains_key("properties"))
            .cloned()
    })
}

/// Any JSON object is taken as the schema itself. Cleanup repairs the
/// rest, so even `{}` or an object full of junk keys is acceptable here.
fn plain_object(raw: &Value) -> Option<Map<String, Value>> {
    raw.as_object().cloned()
}

/// A string holding serialized JSON that parses to an object.
fn embedded_json(raw: &Value) -> Option<Map<String, Value>> {
    let text = raw.as_str()?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn clean(mut object: Map<String, Value>) -> ToolSchema {
    let properties = match object.remove("properties") {
        Some(Value::Object(properties)) => properties,
        _ => Map::new(),
    };
    let required = match object.remove("required") {
        Some(Value::Array(names)) => names
            .into_iter()
            .filter_map(|name| match name {
                Value::String(name) => Some(name),
                _ => None,
            })
            .filter(|name| !RESERVED_NAMES.contains(&name.as_str()))
            .collect(),
        _ => Vec::new(),
    };
    ToolSchema {
        properties,
        required,
        extra: object,
    }
}

// ---------------------------------------------------------------------------
// Typed property view
// ---------------------------------------------------------------------------

/// A tolerant, typed view over one entry of a schema's `properties` map.
///
/// Every field is optional because servers omit most of them; unknown
/// keys are ignored. Use [`PropertySpec::from_value`] rather than serde
/// directly so a malformed entry degrades instead of erroring.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PropertySpec {
    /// Declared JSON type, e.g. `"string"` or `"integer"`.
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Default value applied when the caller omits the parameter.
    pub default: Option<Value>,
    /// Allowed values, empty when unconstrained.
    #[serde(rename = "enum")]
    pub choices: Vec<Value>,
    /// Inclusive numeric lower bound.
    pub minimum: Option<Number>,
    /// Inclusive numeric upper bound.
    pub maximum: Option<Number>,
    /// Minimum string length.
    #[serde(rename = "minLength")]
    pub min_length: Option<u64>,
    /// Maximum string length.
    #[serde(rename = "maxLength")]
    pub max_length: Option<u64>,
    /// Regular expression the value must match.
    pub pattern: Option<String>,
    /// Semantic format hint such as `date`, `date-time`, `email` or `uri`.
    pub format: Option<String>,
    /// Example value supplied by the server.
    pub example: Option<Value>,
    /// Item schema for array-typed properties.
    pub items: Option<Value>,
    /// Minimum array length.
    #[serde(rename = "minItems")]
    pub min_items: Option<u64>,
    /// Maximum array length.
    #[serde(rename = "maxItems")]
    pub max_items: Option<u64>,
    /// Whether array items must be unique.
    #[serde(rename = "uniqueItems")]
    pub unique_items: bool,
}

impl PropertySpec {
    /// Parse a property entry, salvaging `type` and `description` when the
    /// rest of the entry does not deserialize.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
            type_name: value
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_owned),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_owned),
            ..Self::default()
        })
    }

    /// The declared type, or `"any"` when the server did not say.
    pub fn type_or_any(&self) -> &str {
        self.type_name.as_deref().unwrap_or("any")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    // ------------------------------------------------------------ normalize

    #[test]
    fn plain_schema_passes_through() {
        let schema = normalize(&json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }));
        assert_eq!(schema.required, vec!["city"]);
        assert!(schema.properties.contains_key("city"));
        assert_eq!(schema.extra.get("type"), Some(&json!("object")));
    }

    #[test]
    fn missing_properties_becomes_empty_map() {
        let schema = normalize(&json!({"required": ["a"]}));
        assert!(schema.properties.is_empty());
        assert_eq!(schema.required, vec!["a"]);
    }

    #[test]
    fn malformed_properties_and_required_are_repaired() {
        let schema = normalize(&json!({"properties": "oops", "required": "also oops"}));
        assert!(schema.properties.is_empty());
        assert!(schema.required.is_empty());
    }

    #[test]
    fn reserved_names_are_dropped_from_required() {
        let schema = normalize(&json!({
            "properties": {"city": {"type": "string"}},
            "required": ["name", "inputSchema", "city", "description", "schema", "annotations"]
        }));
        assert_eq!(schema.required, vec!["city"]);
    }

    #[test]
    fn non_string_required_entries_are_dropped() {
        let schema = normalize(&json!({"properties": {}, "required": ["a", 7, null]}));
        assert_eq!(schema.required, vec!["a"]);
    }

    #[test]
    fn non_object_values_become_the_empty_schema() {
        for raw in [json!(null), json!(42), json!(["not", "a", "schema"])] {
            let schema = normalize(&raw);
            assert!(schema.is_empty(), "expected empty schema for {raw}");
        }
    }

    #[test]
    fn wrapper_objects_are_unwrapped() {
        for key in NESTED_KEYS {
            let raw = json!({key: {"properties": {"q": {}}, "required": ["q"]}});
            let schema = normalize(&raw);
            assert_eq!(schema.required, vec!["q"], "wrapper key {key}");
        }
    }

    #[test]
    fn wrapper_is_ignored_when_object_has_own_properties() {
        let schema = normalize(&json!({
            "properties": {"outer": {}},
            "schema": {"properties": {"inner": {}}}
        }));
        assert!(schema.properties.contains_key("outer"));
        assert!(!schema.properties.contains_key("inner"));
    }

    #[test]
    fn embedded_json_string_is_parsed() {
        let raw = json!("{\"properties\": {\"q\": {\"type\": \"string\"}}, \"required\": [\"q\"]}");
        let schema = normalize(&raw);
        assert_eq!(schema.required, vec!["q"]);
    }

    #[test]
    fn non_json_string_becomes_the_empty_schema() {
        assert!(normalize(&json!("not json at all")).is_empty());
    }

    #[test]
    fn junk_keys_survive_in_extra() {
        let schema = normalize(&json!({"title": "Weather", "properties": {}}));
        assert_eq!(schema.extra.get("title"), Some(&json!("Weather")));
    }

    // ------------------------------------------------------- normalize_with

    #[test]
    fn provider_success_is_normalized() {
        let schema = normalize_with(|| {
            Ok::<_, std::io::Error>(json!({"properties": {"a": {}}, "required": ["a"]}))
        });
        assert_eq!(schema.required, vec!["a"]);
    }

    #[test]
    fn provider_failure_is_swallowed() {
        let schema = normalize_with(|| {
            Err::<Value, _>(std::io::Error::other("schema endpoint exploded"))
        });
        assert!(schema.is_empty());
    }

    // ----------------------------------------------------- validate_structure

    #[test]
    fn validate_structure_accepts_well_formed_schemas() {
        assert!(validate_structure(&json!({"properties": {}})));
        assert!(validate_structure(&json!({"properties": {}, "required": []})));
    }

    #[test]
    fn validate_structure_rejects_bad_shapes() {
        assert!(!validate_structure(&json!(null)));
        assert!(!validate_structure(&json!("text")));
        assert!(!validate_structure(&json!({})));
        assert!(!validate_structure(&json!({"properties": "nope"})));
        assert!(!validate_structure(&json!({"properties": {}, "required": "nope"})));
    }

    // ------------------------------------------------------------ extraction

    #[test]
    fn optional_defaults_skip_required_parameters() {
        let schema = normalize(&json!({
            "properties": {
                "city": {"type": "string", "default": "here"},
                "units": {"type": "string", "default": "metric"},
                "days": {"type": "integer"}
            },
            "required": ["city"]
        }));
        let defaults = optional_defaults(&schema);
        assert_eq!(defaults.get("units"), Some(&json!("metric")));
        assert!(!defaults.contains_key("city"), "required default must not auto-fill");
        assert!(!defaults.contains_key("days"), "no default declared");
    }

    #[test]
    fn required_params_reflect_the_cleaned_list() {
        let schema = normalize(&json!({
            "properties": {},
            "required": ["name", "city", "country"]
        }));
        assert_eq!(required_params(&schema), ["city", "country"]);
    }

    // ---------------------------------------------------------- PropertySpec

    #[test]
    fn property_spec_reads_common_fields() {
        let spec = PropertySpec::from_value(&json!({
            "type": "string",
            "description": "City name",
            "default": "Paris",
            "enum": ["Paris", "London"],
            "minLength": 1,
            "maxLength": 64,
            "format": "email",
            "example": "nice@example.com"
        }));
        assert_eq!(spec.type_or_any(), "string");
        assert_eq!(spec.description.as_deref(), Some("City name"));
        assert_eq!(spec.default, Some(json!("Paris")));
        assert_eq!(spec.choices.len(), 2);
        assert_eq!(spec.min_length, Some(1));
        assert_eq!(spec.format.as_deref(), Some("email"));
    }

    #[test]
    fn property_spec_salvages_type_from_malformed_entries() {
        let spec = PropertySpec::from_value(&json!({
            "type": "integer",
            "description": "Days ahead",
            "minimum": "not a number"
        }));
        assert_eq!(spec.type_or_any(), "integer");
        assert_eq!(spec.description.as_deref(), Some("Days ahead"));
        assert!(spec.minimum.is_none());
    }

    #[test]
    fn property_spec_defaults_to_any() {
        assert_eq!(PropertySpec::from_value(&json!({})).type_or_any(), "any");
        assert_eq!(PropertySpec::from_value(&json!(null)).type_or_any(), "any");
    }
}
