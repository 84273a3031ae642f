//! `type: "object"` schema compilation, grounded in the same state graph as
//! [`crate::acceptor::json::Object`] but with per-property transitions: at
//! any point only not-yet-present properties are offered, `}` is only
//! reachable once every required property has a value, and `,` is only
//! offered while more properties remain available.
use crate::acceptor::json::{JsonValue, KeyValue};
use crate::acceptor::{Acceptor, Stepper};
use crate::value::StepperValue;
use ahash::AHashMap;
use serde_json::Value as Json;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CreateObjectSchemaError {
    #[error("required property {0:?} is not defined in \"properties\"")]
    UndefinedRequiredProperty(String),
}

#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub properties: AHashMap<String, Arc<Acceptor>>,
    pub property_order: Vec<String>,
    pub required: Vec<String>,
    pub allow_additional_properties: bool,
}

impl ObjectSchema {
    pub fn new(
        properties: AHashMap<String, Arc<Acceptor>>,
        property_order: Vec<String>,
        required: Vec<String>,
        allow_additional_properties: bool,
    ) -> Result<Self, CreateObjectSchemaError> {
        for name in &required {
            if !properties.contains_key(name) {
                return Err(CreateObjectSchemaError::UndefinedRequiredProperty(
                    name.clone(),
                ));
            }
        }
        Ok(Self {
            properties,
            property_order,
            required,
            allow_additional_properties,
        })
    }

    fn required_satisfied(&self, value: &AHashMap<String, Json>) -> bool {
        self.required.iter().all(|name| value.contains_key(name))
    }

    fn has_remaining_slot(&self, value: &AHashMap<String, Json>) -> bool {
        self.allow_additional_properties || value.len() < self.properties.len()
    }

    fn member_starts(&self, value: &AHashMap<String, Json>) -> Vec<Stepper> {
        let mut out = Vec::new();
        for name in &self.property_order {
            if value.contains_key(name) {
                continue;
            }
            let Some(prop_schema) = self.properties.get(name) else {
                continue;
            };
            let kv = Arc::new(Acceptor::KeyValue(KeyValue::new_fixed_key(
                name,
                prop_schema.clone(),
            )));
            out.extend(kv.initial_steppers());
        }
        if self.allow_additional_properties {
            let dynamic = Arc::new(Acceptor::KeyValue(KeyValue::new_dynamic_key(Arc::new(
                Acceptor::JsonValue(JsonValue::new()),
            ))));
            out.extend(dynamic.initial_steppers());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    BeforeOpen,
    AfterOpen,
    Member,
    AfterMember,
    AfterComma,
}

#[derive(Debug, Clone)]
pub struct ObjectSchemaStepper {
    pub schema: Arc<ObjectSchema>,
    phase: Phase,
    current: Vec<Stepper>,
    pub value: AHashMap<String, Json>,
    closed: bool,
}

impl ObjectSchemaStepper {
    pub fn new(schema: Arc<ObjectSchema>) -> Self {
        Self {
            schema,
            phase: Phase::BeforeOpen,
            current: vec![],
            value: AHashMap::default(),
            closed: false,
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<ObjectSchemaStepper> {
        let mut out = Vec::new();
        match self.phase {
            Phase::BeforeOpen => {
                if ch == '{' {
                    out.push(ObjectSchemaStepper {
                        phase: Phase::AfterOpen,
                        ..self.clone()
                    });
                }
            }
            Phase::AfterOpen => {
                if ch.is_ascii_whitespace() {
                    out.push(self.clone());
                } else if ch == '}' && self.schema.required_satisfied(&self.value) {
                    out.push(ObjectSchemaStepper {
                        phase: Phase::AfterMember,
                        closed: true,
                        ..self.clone()
                    });
                } else {
                    for start in self.schema.member_starts(&self.value) {
                        for advanced in start.consume_char(ch) {
                            out.push(self.with_member(advanced));
                        }
                    }
                }
            }
            Phase::Member => {
                for sub in &self.current {
                    for advanced in sub.consume_char(ch) {
                        if advanced.has_reached_accept_state() {
                            if let StepperValue::KeyValue(k, v) = advanced.current_value() {
                                let mut value = self.value.clone();
                                value.insert(k, v);
                                out.push(ObjectSchemaStepper {
                                    schema: self.schema.clone(),
                                    phase: Phase::AfterMember,
                                    current: vec![],
                                    value,
                                    closed: false,
                                });
                            }
                        }
                        out.push(self.with_member(advanced));
                    }
                }
            }
            Phase::AfterMember => {
                if ch.is_ascii_whitespace() {
                    out.push(self.clone());
                } else if ch == ',' && self.schema.has_remaining_slot(&self.value) {
                    out.push(ObjectSchemaStepper {
                        phase: Phase::AfterComma,
                        ..self.clone()
                    });
                } else if ch == '}' && self.schema.required_satisfied(&self.value) {
                    out.push(ObjectSchemaStepper {
                        phase: Phase::AfterMember,
                        closed: true,
                        ..self.clone()
                    });
                }
            }
            Phase::AfterComma => {
                if ch.is_ascii_whitespace() {
                    out.push(self.clone());
                } else {
                    for start in self.schema.member_starts(&self.value) {
                        for advanced in start.consume_char(ch) {
                            out.push(self.with_member(advanced));
                        }
                    }
                }
            }
        }
        out
    }

    fn with_member(&self, stepper: Stepper) -> ObjectSchemaStepper {
        ObjectSchemaStepper {
            schema: self.schema.clone(),
            phase: Phase::Member,
            current: vec![stepper],
            value: self.value.clone(),
            closed: false,
        }
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.closed
    }

    pub fn can_accept_more_input(&self) -> bool {
        !self.closed
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Json(Json::Object(
            self.value.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::primitive::StringLiteral;

    fn string_prop() -> Arc<Acceptor> {
        Arc::new(Acceptor::StringLiteral(StringLiteral::new()))
    }

    #[test]
    fn rejects_close_before_required_property() {
        let schema = Arc::new(
            ObjectSchema::new(
                [("name".to_string(), string_prop())].into_iter().collect(),
                vec!["name".to_string()],
                vec!["name".to_string()],
                false,
            )
            .unwrap(),
        );
        let mut live = vec![ObjectSchemaStepper::new(schema)];
        for ch in "{}".chars() {
            live = live.iter().flat_map(|s| s.consume_char(ch)).collect();
        }
        assert!(!live.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn accepts_once_required_present() {
        let schema = Arc::new(
            ObjectSchema::new(
                [("name".to_string(), string_prop())].into_iter().collect(),
                vec!["name".to_string()],
                vec!["name".to_string()],
                false,
            )
            .unwrap(),
        );
        let mut live = vec![ObjectSchemaStepper::new(schema)];
        for ch in r#"{"name": "bob"}"#.chars() {
            live = live.iter().flat_map(|s| s.consume_char(ch)).collect();
            assert!(!live.is_empty(), "died at {ch:?}");
        }
        assert!(live.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn undefined_required_property_errors() {
        let result = ObjectSchema::new(
            AHashMap::default(),
            vec![],
            vec!["missing".to_string()],
            false,
        );
        assert!(result.is_err());
    }
}
