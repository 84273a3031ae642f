//! JSON Schema compilation (C5): turns a `serde_json::Value` schema into a
//! tree of [`Acceptor`]s. Grounded in the same two-pass shape as the schema
//! compiler it's modelled on: `resolve_subschemas` first distributes `$ref`/
//! `allOf`/`anyOf`/`oneOf`, then a type dispatch table builds the concrete
//! acceptor for whatever's left.
pub mod array_schema;
pub mod number_schema;
pub mod object_schema;
pub mod string_schema;

use crate::acceptor::primitive::Phrase;
use crate::acceptor::{Acceptor, Stepper};
use crate::config::RegexConfig;
use crate::value::StepperValue;
use ahash::AHashMap;
use serde_json::Value as Json;
use std::sync::{Arc, OnceLock};

#[derive(Debug, thiserror::Error)]
pub enum CreateSchemaError {
    /// `$ref` pointed at a path with no matching `$defs` entry.
    #[error("unresolved $ref {0:?}")]
    UnresolvedRef(String),
    /// The schema used the `not` keyword, which this compiler does not support.
    #[error("the \"not\" keyword is not supported")]
    NotKeywordUnsupported,
    #[error(transparent)]
    Object(#[from] object_schema::CreateObjectSchemaError),
    #[error(transparent)]
    String(#[from] string_schema::CreateStringSchemaError),
}

/// Tracks `$defs` and in-flight `$ref` compilation so cyclic schemas (a
/// list-of-self, a linked-list node) terminate: the first time a `$ref` is
/// seen its target starts compiling and a [`OnceLock`] is registered before
/// recursing, so any self-reference reached during that recursion gets a
/// [`SchemaAcceptor::Ref`] pointing at the same not-yet-filled cell instead
/// of recursing forever.
#[derive(Default)]
pub struct CompileContext {
    defs: AHashMap<String, Json>,
    resolved: AHashMap<String, Arc<Acceptor>>,
    in_progress: AHashMap<String, Arc<OnceLock<Arc<Acceptor>>>>,
    pub regex_config: RegexConfig,
}

impl CompileContext {
    pub fn new(regex_config: RegexConfig) -> Self {
        Self {
            regex_config,
            ..Default::default()
        }
    }

    /// Register every `$defs` block reachable from `schema`, not just the
    /// one at its top level: a `$ref` may point at a definition nested
    /// inside a subschema's own `$defs`. Each definition is registered
    /// twice, under both its unscoped form (`#/$defs/{name}`, so a bare
    /// `$ref` to it resolves regardless of where it's nested) and its
    /// path-scoped form (`#{path}/$defs/{name}`), mirroring how the schema
    /// compiler this is modelled on resolves subschemas before dispatch.
    fn register_defs(&mut self, schema: &Json) {
        self.register_defs_at(schema, "");
    }

    fn register_defs_at(&mut self, schema: &Json, path: &str) {
        let Some(obj) = schema.as_object() else {
            return;
        };
        if let Some(defs) = obj.get("$defs").and_then(Json::as_object) {
            for (name, def) in defs {
                self.defs.insert(format!("#/$defs/{name}"), def.clone());
                let scoped = format!("{path}/$defs/{name}");
                self.defs.insert(format!("#{scoped}"), def.clone());
                self.register_defs_at(def, &scoped);
            }
        }
        for (key, value) in obj {
            if key == "$defs" {
                continue;
            }
            match value {
                Json::Object(_) => self.register_defs_at(value, &format!("{path}/{key}")),
                Json::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.register_defs_at(item, &format!("{path}/{key}/{i}"));
                    }
                }
                _ => {}
            }
        }
    }
}

pub fn compile(schema: &Json, ctx: &mut CompileContext) -> Result<Arc<Acceptor>, CreateSchemaError> {
    ctx.register_defs(schema);
    // Register the root schema under "#" before compiling it, the same way
    // `compile_ref` registers a `$defs` entry's cell before recursing, so a
    // self-referential `{"$ref": "#"}` anywhere in the tree (not just inside
    // `$defs`) resolves to this same compiled acceptor instead of recursing
    // forever.
    let cell = Arc::new(OnceLock::new());
    ctx.in_progress.insert("#".to_string(), cell.clone());
    let compiled = compile_inner(schema, ctx)?;
    let _ = cell.set(compiled.clone());
    ctx.in_progress.remove("#");
    ctx.resolved.insert("#".to_string(), compiled.clone());
    Ok(compiled)
}

fn compile_inner(schema: &Json, ctx: &mut CompileContext) -> Result<Arc<Acceptor>, CreateSchemaError> {
    match schema {
        Json::Bool(true) => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Bare(Arc::new(
            Acceptor::JsonValue(crate::acceptor::json::JsonValue::new()),
        ))))),
        Json::Bool(false) => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(vec![])))),
        Json::Object(map) => compile_object(map, schema, ctx),
        other => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Bare(phrase_for(
            other,
        ))))),
    }
}

fn phrase_for(value: &Json) -> Arc<Acceptor> {
    Arc::new(Acceptor::Phrase(Phrase::new(&value.to_string())))
}

fn compile_object(
    map: &serde_json::Map<String, Json>,
    schema: &Json,
    ctx: &mut CompileContext,
) -> Result<Arc<Acceptor>, CreateSchemaError> {
    if map.contains_key("not") {
        return Err(CreateSchemaError::NotKeywordUnsupported);
    }

    if let Some(Json::String(path)) = map.get("$ref") {
        return compile_ref(path, ctx);
    }

    if let Some(Json::Array(subschemas)) = map.get("allOf") {
        let merged = merge_all_of(subschemas);
        return compile_inner(&merged, ctx);
    }

    if let Some(Json::Array(subschemas)) = map.get("anyOf").or_else(|| map.get("oneOf")) {
        let branches = subschemas
            .iter()
            .map(|s| compile_inner(s, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(branches))));
    }

    if map.get("nullable").and_then(Json::as_bool) == Some(true) {
        let mut without_nullable = schema.clone();
        without_nullable
            .as_object_mut()
            .unwrap()
            .remove("nullable");
        let inner = compile_inner(&without_nullable, ctx)?;
        let null_phrase = Arc::new(Acceptor::Phrase(Phrase::optional("null")));
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(vec![
            null_phrase,
            inner,
        ]))));
    }

    if let Some(Json::Array(types)) = map.get("type") {
        let branches = types
            .iter()
            .map(|t| {
                let mut copy = schema.clone();
                copy.as_object_mut().unwrap().insert("type".into(), t.clone());
                compile_inner(&copy, ctx)
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(branches))));
    }

    if let Some(values) = map.get("enum").and_then(Json::as_array) {
        let branches = values.iter().map(phrase_for).collect();
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(branches))));
    }

    if let Some(value) = map.get("const") {
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Bare(phrase_for(
            value,
        )))));
    }

    let inferred_type = map
        .get("type")
        .and_then(Json::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if map.contains_key("properties") {
                "object".to_string()
            } else if map.contains_key("items") {
                "array".to_string()
            } else {
                "object".to_string()
            }
        });

    match inferred_type.as_str() {
        "object" => compile_object_schema(map, ctx),
        "array" => compile_array_schema(map, ctx),
        "string" => compile_string_schema(map, ctx),
        "number" => compile_number_schema(map, false),
        "integer" => compile_number_schema(map, true),
        "boolean" => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::AnyOf(vec![
            Arc::new(Acceptor::Phrase(Phrase::new("true"))),
            Arc::new(Acceptor::Phrase(Phrase::new("false"))),
        ])))),
        "null" => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Bare(Arc::new(
            Acceptor::Phrase(Phrase::new("null")),
        ))))),
        _ => Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Bare(Arc::new(
            Acceptor::JsonValue(crate::acceptor::json::JsonValue::new()),
        ))))),
    }
}

fn compile_ref(path: &str, ctx: &mut CompileContext) -> Result<Arc<Acceptor>, CreateSchemaError> {
    if let Some(acceptor) = ctx.resolved.get(path) {
        return Ok(acceptor.clone());
    }
    if let Some(cell) = ctx.in_progress.get(path) {
        return Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Ref(cell.clone()))));
    }
    let target = ctx
        .defs
        .get(path)
        .cloned()
        .ok_or_else(|| CreateSchemaError::UnresolvedRef(path.to_string()))?;
    let cell = Arc::new(OnceLock::new());
    ctx.in_progress.insert(path.to_string(), cell.clone());
    let compiled = compile_inner(&target, ctx)?;
    let _ = cell.set(compiled.clone());
    ctx.in_progress.remove(path);
    ctx.resolved.insert(path.to_string(), compiled.clone());
    Ok(compiled)
}

fn merge_all_of(subschemas: &[Json]) -> Json {
    let mut merged = serde_json::Map::new();
    for sub in subschemas {
        if let Some(obj) = sub.as_object() {
            for (k, v) in obj {
                match (merged.get_mut(k), v) {
                    (Some(Json::Object(existing)), Json::Object(incoming)) => {
                        for (ik, iv) in incoming {
                            existing.insert(ik.clone(), iv.clone());
                        }
                    }
                    (Some(Json::Array(existing)), Json::Array(incoming)) if k == "required" => {
                        for item in incoming {
                            if !existing.contains(item) {
                                existing.push(item.clone());
                            }
                        }
                    }
                    _ => {
                        merged.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }
    Json::Object(merged)
}

fn compile_object_schema(
    map: &serde_json::Map<String, Json>,
    ctx: &mut CompileContext,
) -> Result<Arc<Acceptor>, CreateSchemaError> {
    let mut properties = AHashMap::default();
    let mut property_order = Vec::new();
    let empty_props = serde_json::Map::new();
    let props = map
        .get("properties")
        .and_then(Json::as_object)
        .unwrap_or(&empty_props);
    for (name, prop_schema) in props {
        let compiled = compile_inner(prop_schema, ctx)?;
        property_order.push(name.clone());
        properties.insert(name.clone(), compiled);
    }
    let required = map
        .get("required")
        .and_then(Json::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .filter(|name| !property_is_effectively_optional(props, name))
                .collect()
        })
        .unwrap_or_default();
    // JSON Schema (and the schema compiler this is modelled on) treats
    // additional properties as allowed unless explicitly forbidden.
    let allow_additional = map
        .get("additionalProperties")
        .and_then(Json::as_bool)
        .unwrap_or(true);
    let schema = object_schema::ObjectSchema::new(
        properties,
        property_order,
        required,
        allow_additional,
    )?;
    Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Object(Arc::new(
        schema,
    )))))
}

/// A property named in `required` is not actually mandatory for
/// accept-state purposes if its own schema is `nullable` or carries a
/// `default`: the model may omit it and the caller fills in null/the
/// default afterwards.
fn property_is_effectively_optional(props: &serde_json::Map<String, Json>, name: &str) -> bool {
    props.get(name).and_then(Json::as_object).is_some_and(|p| {
        p.get("nullable").and_then(Json::as_bool) == Some(true) || p.contains_key("default")
    })
}

fn compile_array_schema(
    map: &serde_json::Map<String, Json>,
    ctx: &mut CompileContext,
) -> Result<Arc<Acceptor>, CreateSchemaError> {
    let items_schema = map.get("items").cloned().unwrap_or(Json::Bool(true));
    let item = compile_inner(&items_schema, ctx)?;
    let min_items = map.get("minItems").and_then(Json::as_u64).unwrap_or(0) as usize;
    let max_items = map
        .get("maxItems")
        .and_then(Json::as_u64)
        .unwrap_or(array_schema::DEFAULT_MAX_ITEMS as u64) as usize;
    let schema = array_schema::ArraySchema::new(item, min_items, max_items);
    Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Array(Arc::new(
        schema,
    )))))
}

fn compile_string_schema(
    map: &serde_json::Map<String, Json>,
    ctx: &mut CompileContext,
) -> Result<Arc<Acceptor>, CreateSchemaError> {
    let mut schema = string_schema::StringSchema::new();
    if let Some(min) = map.get("minLength").and_then(Json::as_u64) {
        schema.min_length = min as usize;
    }
    if let Some(max) = map.get("maxLength").and_then(Json::as_u64) {
        schema.max_length = max as usize;
    }
    if let Some(pattern) = map.get("pattern").and_then(Json::as_str) {
        schema = schema.with_pattern(pattern, ctx.regex_config.max_dfa_states)?;
    }
    if let Some(format) = map.get("format").and_then(Json::as_str) {
        schema = schema.with_format(format)?;
    }
    Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::String(Arc::new(
        schema,
    )))))
}

fn compile_number_schema(
    map: &serde_json::Map<String, Json>,
    integer_only: bool,
) -> Result<Arc<Acceptor>, CreateSchemaError> {
    let mut schema = number_schema::NumberSchema::new(integer_only);
    schema.minimum = map.get("minimum").and_then(Json::as_f64);
    schema.maximum = map.get("maximum").and_then(Json::as_f64);
    schema.exclusive_minimum = map.get("exclusiveMinimum").and_then(Json::as_f64);
    schema.exclusive_maximum = map.get("exclusiveMaximum").and_then(Json::as_f64);
    Ok(Arc::new(Acceptor::Schema(SchemaAcceptor::Number(Arc::new(
        schema,
    )))))
}

/// A compiled JSON Schema node. Wraps either a plain [`Acceptor`] (phrases,
/// bare JSON values, enum/const literals, nullable/anyOf unions) or one of
/// the schema-specific types that need custom transition gating.
#[derive(Debug, Clone)]
pub enum SchemaAcceptor {
    Bare(Arc<Acceptor>),
    AnyOf(Vec<Arc<Acceptor>>),
    Object(Arc<object_schema::ObjectSchema>),
    Array(Arc<array_schema::ArraySchema>),
    String(Arc<string_schema::StringSchema>),
    Number(Arc<number_schema::NumberSchema>),
    /// A forward/cyclic `$ref` whose target is still being compiled when
    /// this node was constructed; resolved lazily through the shared cell.
    Ref(Arc<OnceLock<Arc<Acceptor>>>),
}

impl SchemaAcceptor {
    pub fn is_optional(&self) -> bool {
        match self {
            SchemaAcceptor::Bare(a) => a.is_optional(),
            SchemaAcceptor::AnyOf(branches) => branches.iter().any(|b| b.is_optional()),
            _ => false,
        }
    }

    pub fn new_stepper(&self) -> SchemaStepper {
        match self {
            SchemaAcceptor::Bare(a) => SchemaStepper::Bare(Stepper::fresh(a)),
            SchemaAcceptor::AnyOf(branches) => SchemaStepper::AnyOf(
                branches.iter().flat_map(|b| b.initial_steppers()).collect(),
            ),
            SchemaAcceptor::Object(schema) => {
                SchemaStepper::Object(object_schema::ObjectSchemaStepper::new(schema.clone()))
            }
            SchemaAcceptor::Array(schema) => {
                SchemaStepper::Array(array_schema::new_stepper(schema))
            }
            SchemaAcceptor::String(schema) => SchemaStepper::String(
                string_schema::StringSchemaStepper::new(schema.as_ref().clone()),
            ),
            SchemaAcceptor::Number(schema) => SchemaStepper::Number(
                number_schema::NumberSchemaStepper::new(schema.as_ref().clone()),
            ),
            SchemaAcceptor::Ref(cell) => {
                let target = cell.get().expect("$ref target compiled before use");
                SchemaStepper::Bare(Stepper::fresh(target))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchemaStepper {
    Bare(Stepper),
    AnyOf(Vec<Stepper>),
    Object(object_schema::ObjectSchemaStepper),
    Array(array_schema::ArraySchemaStepper),
    String(string_schema::StringSchemaStepper),
    Number(number_schema::NumberSchemaStepper),
}

impl SchemaStepper {
    pub fn consume_char(&self, ch: char) -> Vec<SchemaStepper> {
        match self {
            SchemaStepper::Bare(s) => s.consume_char(ch).into_iter().map(SchemaStepper::Bare).collect(),
            SchemaStepper::AnyOf(branches) => branches
                .iter()
                .flat_map(|s| s.consume_char(ch))
                .map(|s| SchemaStepper::AnyOf(vec![s]))
                .collect(),
            SchemaStepper::Object(s) => s
                .consume_char(ch)
                .into_iter()
                .map(SchemaStepper::Object)
                .collect(),
            SchemaStepper::Array(s) => s
                .consume_char(ch)
                .into_iter()
                .map(SchemaStepper::Array)
                .collect(),
            SchemaStepper::String(s) => s
                .consume_char(ch)
                .into_iter()
                .map(SchemaStepper::String)
                .collect(),
            SchemaStepper::Number(s) => s
                .consume_char(ch)
                .into_iter()
                .map(SchemaStepper::Number)
                .collect(),
        }
    }

    pub fn has_reached_accept_state(&self) -> bool {
        match self {
            SchemaStepper::Bare(s) => s.has_reached_accept_state(),
            SchemaStepper::AnyOf(branches) => branches.iter().any(|s| s.has_reached_accept_state()),
            SchemaStepper::Object(s) => s.has_reached_accept_state(),
            SchemaStepper::Array(s) => s.has_reached_accept_state(),
            SchemaStepper::String(s) => s.has_reached_accept_state(),
            SchemaStepper::Number(s) => s.has_reached_accept_state(),
        }
    }

    pub fn can_accept_more_input(&self) -> bool {
        match self {
            SchemaStepper::Bare(s) => s.can_accept_more_input(),
            SchemaStepper::AnyOf(branches) => branches.iter().any(|s| s.can_accept_more_input()),
            SchemaStepper::Object(s) => s.can_accept_more_input(),
            SchemaStepper::Array(s) => s.can_accept_more_input(),
            SchemaStepper::String(s) => s.can_accept_more_input(),
            SchemaStepper::Number(s) => s.can_accept_more_input(),
        }
    }

    pub fn current_value(&self) -> StepperValue {
        match self {
            SchemaStepper::Bare(s) => s.current_value(),
            SchemaStepper::AnyOf(branches) => branches
                .iter()
                .find(|s| s.has_reached_accept_state())
                .or_else(|| branches.first())
                .map(|s| s.current_value())
                .unwrap_or(StepperValue::None),
            SchemaStepper::Object(s) => s.current_value(),
            SchemaStepper::Array(s) => s.current_value(),
            SchemaStepper::String(s) => s.current_value(),
            SchemaStepper::Number(s) => s.current_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::advance_all_basic;
    use crate::config::RegexConfig;

    fn compiled(schema: Json) -> Arc<Acceptor> {
        let mut ctx = CompileContext::new(RegexConfig::default());
        compile(&schema, &mut ctx).unwrap()
    }

    #[test]
    fn simple_object_schema_accepts_valid_json() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["name"]
        });
        let acceptor = compiled(schema);
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, r#"{"name": "Ada", "age": 30}"#);
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn not_keyword_is_rejected() {
        let mut ctx = CompileContext::new(RegexConfig::default());
        let schema = serde_json::json!({"not": {"type": "string"}});
        assert!(compile(&schema, &mut ctx).is_err());
    }

    #[test]
    fn recursive_ref_schema_compiles_and_terminates() {
        let schema = serde_json::json!({
            "$defs": {
                "node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "integer"},
                        "next": {"anyOf": [{"type": "null"}, {"$ref": "#/$defs/node"}]}
                    },
                    "required": ["value"]
                }
            },
            "$ref": "#/$defs/node"
        });
        let acceptor = compiled(schema);
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, r#"{"value": 1, "next": {"value": 2, "next": null}}"#);
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn root_self_ref_without_defs_terminates() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "type": {"type": "string"},
                "children": {"type": "array", "items": {"$ref": "#"}, "maxItems": 1}
            },
            "required": ["type"]
        });
        let acceptor = compiled(schema);
        let steppers = acceptor.initial_steppers();
        let nested = r#"{"type": "div", "children": [{"type": "button"}]}"#;
        let result = advance_all_basic(&steppers, nested);
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn enum_schema_only_accepts_listed_values() {
        let schema = serde_json::json!({"enum": ["red", "green", "blue"]});
        let acceptor = compiled(schema);
        let ok = advance_all_basic(&acceptor.initial_steppers(), "\"green\"");
        assert!(ok.iter().any(|s| s.has_reached_accept_state()));
        let bad = advance_all_basic(&acceptor.initial_steppers(), "\"purple\"");
        assert!(!bad.iter().any(|s| s.has_reached_accept_state()));
    }
}
