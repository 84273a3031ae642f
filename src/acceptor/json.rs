//! JSON value acceptors (C4): objects, arrays, members, and the top-level
//! value dispatcher used by bare (schema-less) JSON acceptance.
use super::primitive::{Number, Phrase, StringLiteral, Whitespace};
use super::{Acceptor, Stepper};
use crate::value::StepperValue;
use ahash::AHashMap;
use serde_json::Value as Json;
use std::sync::Arc;

fn phrase(s: &str) -> Arc<Acceptor> {
    Arc::new(Acceptor::Phrase(Phrase::new(s)))
}

fn whitespace() -> Arc<Acceptor> {
    Arc::new(Acceptor::Whitespace(Whitespace::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberPhase {
    BeforeOpen,
    Empty,
    Member,
    AfterMember,
    AfterComma,
}

/// A JSON object with unconstrained member acceptors: `{ value , value ... }`
/// where each member is produced by `member`. Schema-governed objects build
/// their own transition table instead (see [`crate::schema::object_schema`])
/// but share this same state shape: 0 open brace, 1 empty-or-first-member,
/// 2 inside a member, 3 after a member (comma or close), 4 after a comma.
#[derive(Debug, Clone)]
pub struct Object {
    pub member: Arc<Acceptor>,
}

impl Object {
    pub fn new(member: Arc<Acceptor>) -> Self {
        Self { member }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStepper {
    pub acceptor: Object,
    phase: MemberPhase,
    current: Vec<Stepper>,
    pub value: AHashMap<String, Json>,
    text: String,
}

impl ObjectStepper {
    pub fn new(acceptor: Object) -> Self {
        Self {
            acceptor,
            phase: MemberPhase::BeforeOpen,
            current: vec![],
            value: AHashMap::default(),
            text: String::new(),
        }
    }

    fn with(&self, phase: MemberPhase, current: Vec<Stepper>, ch: char) -> ObjectStepper {
        let mut text = self.text.clone();
        text.push(ch);
        ObjectStepper {
            acceptor: self.acceptor.clone(),
            phase,
            current,
            value: self.value.clone(),
            text,
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<ObjectStepper> {
        let mut out = Vec::new();
        match self.phase {
            MemberPhase::BeforeOpen => {
                if ch == '{' {
                    out.push(self.with(MemberPhase::Empty, vec![], ch));
                }
            }
            MemberPhase::Empty => {
                if ch == '}' {
                    out.push(self.with(MemberPhase::AfterMember, vec![], ch));
                } else {
                    for sub in self.acceptor.member.initial_steppers() {
                        for advanced in sub.consume_char(ch) {
                            out.push(self.with(MemberPhase::Member, vec![advanced], ch));
                        }
                    }
                }
            }
            MemberPhase::Member => {
                for sub in &self.current {
                    for advanced in sub.consume_char(ch) {
                        if advanced.has_reached_accept_state() {
                            if let StepperValue::KeyValue(k, v) = advanced.current_value() {
                                let mut merged = self.value.clone();
                                merged.insert(k, v);
                                let mut next = self.with(MemberPhase::AfterMember, vec![], ch);
                                next.value = merged;
                                out.push(next);
                            }
                        }
                        out.push(self.with(MemberPhase::Member, vec![advanced], ch));
                    }
                }
            }
            MemberPhase::AfterMember => {
                if ch == ',' {
                    out.push(self.with(MemberPhase::AfterComma, vec![], ch));
                } else if ch == '}' {
                    out.push(self.with(MemberPhase::AfterMember, vec![], ch));
                }
            }
            MemberPhase::AfterComma => {
                for sub in self.acceptor.member.initial_steppers() {
                    for advanced in sub.consume_char(ch) {
                        out.push(self.with(MemberPhase::Member, vec![advanced], ch));
                    }
                }
            }
        }
        out
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.phase == MemberPhase::AfterMember && self.text.ends_with('}')
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.phase != MemberPhase::AfterMember || !self.text.ends_with('}')
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Json(Json::Object(
            self.value
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))
    }
}

/// A JSON array of homogeneous `item` acceptors: `[ item , item ... ]`.
#[derive(Debug, Clone)]
pub struct Array {
    pub item: Arc<Acceptor>,
    pub min_items: usize,
    pub max_items: usize,
}

impl Array {
    pub fn new(item: Arc<Acceptor>) -> Self {
        Self {
            item,
            min_items: 0,
            max_items: u32::MAX as usize,
        }
    }

    pub fn with_bounds(mut self, min_items: usize, max_items: usize) -> Self {
        self.min_items = min_items;
        self.max_items = max_items;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArrayPhase {
    BeforeOpen,
    AwaitingItem,
    Item,
    AfterItem,
}

#[derive(Debug, Clone)]
pub struct ArrayStepper {
    pub acceptor: Array,
    phase: ArrayPhase,
    current: Vec<Stepper>,
    pub value: Vec<Json>,
    closed: bool,
}

impl ArrayStepper {
    pub fn new(acceptor: Array) -> Self {
        Self {
            acceptor,
            phase: ArrayPhase::BeforeOpen,
            current: vec![],
            value: vec![],
            closed: false,
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<ArrayStepper> {
        let mut out = Vec::new();
        match self.phase {
            ArrayPhase::BeforeOpen => {
                if ch == '[' {
                    out.push(ArrayStepper {
                        phase: ArrayPhase::AwaitingItem,
                        ..self.clone()
                    });
                }
            }
            ArrayPhase::AwaitingItem => {
                if ch == ']' && self.value.len() >= self.acceptor.min_items {
                    out.push(ArrayStepper {
                        phase: ArrayPhase::AfterItem,
                        closed: true,
                        ..self.clone()
                    });
                }
                if self.value.len() < self.acceptor.max_items {
                    for sub in self.acceptor.item.initial_steppers() {
                        for advanced in sub.consume_char(ch) {
                            out.push(ArrayStepper {
                                phase: ArrayPhase::Item,
                                current: vec![advanced],
                                ..self.clone()
                            });
                        }
                    }
                }
            }
            ArrayPhase::Item => {
                for sub in &self.current {
                    for advanced in sub.consume_char(ch) {
                        out.push(ArrayStepper {
                            phase: ArrayPhase::Item,
                            current: vec![advanced],
                            ..self.clone()
                        });
                    }
                    if sub.has_reached_accept_state() {
                        let value = sub.current_value().into_json().unwrap_or(Json::Null);
                        let mut appended = self.value.clone();
                        appended.push(value);
                        if ch == ']' && appended.len() >= self.acceptor.min_items {
                            out.push(ArrayStepper {
                                phase: ArrayPhase::AfterItem,
                                current: vec![],
                                value: appended.clone(),
                                closed: true,
                                acceptor: self.acceptor.clone(),
                            });
                        }
                        if ch == ',' && appended.len() < self.acceptor.max_items {
                            out.push(ArrayStepper {
                                phase: ArrayPhase::AwaitingItem,
                                current: vec![],
                                value: appended,
                                closed: false,
                                acceptor: self.acceptor.clone(),
                            });
                        }
                    }
                }
            }
            ArrayPhase::AfterItem => {}
        }
        out
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.closed
    }

    pub fn can_accept_more_input(&self) -> bool {
        !self.closed
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Json(Json::Array(self.value.clone()))
    }
}

/// A JSON object member: `"key" : value`, built as a three-part chain.
#[derive(Debug, Clone)]
pub struct KeyValue {
    pub key: Arc<Acceptor>,
    pub value: Arc<Acceptor>,
}

impl KeyValue {
    pub fn new_dynamic_key(value: Arc<Acceptor>) -> Self {
        Self {
            key: Arc::new(Acceptor::StringLiteral(StringLiteral::new())),
            value,
        }
    }

    pub fn new_fixed_key(key: &str, value: Arc<Acceptor>) -> Self {
        Self {
            key: Arc::new(Acceptor::Phrase(Phrase::new(&format!("{key:?}")))),
            value,
        }
    }

    fn chain(&self) -> super::composite::Chain {
        super::composite::Chain::new(vec![
            self.key.clone(),
            whitespace(),
            phrase(":"),
            whitespace(),
            self.value.clone(),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct KeyValueStepper {
    pub acceptor: KeyValue,
    pub inner: super::composite::ChainStepper,
}

impl KeyValueStepper {
    pub fn new(acceptor: KeyValue) -> Self {
        let inner = super::composite::ChainStepper::new(acceptor.chain());
        Self { acceptor, inner }
    }

    pub fn consume_char(&self, ch: char) -> Vec<KeyValueStepper> {
        self.inner
            .consume_char(ch)
            .into_iter()
            .map(|inner| KeyValueStepper {
                acceptor: self.acceptor.clone(),
                inner,
            })
            .collect()
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.inner.has_reached_accept_state()
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.inner.can_accept_more_input()
    }

    pub fn current_value(&self) -> StepperValue {
        let key = match self.inner.history().first() {
            Some(StepperValue::Text(raw)) => {
                serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.clone())
            }
            _ => String::new(),
        };
        let value = self
            .inner
            .history()
            .get(4)
            .cloned()
            .or_else(|| self.inner.current_sub().map(|s| s.current_value()))
            .and_then(|v| v.into_json())
            .unwrap_or(Json::Null);
        StepperValue::KeyValue(key, value)
    }
}

/// Dispatches to whichever bare JSON value acceptor matches next: object,
/// array, string, number, `true`/`false`/`null`. Used for schema-less JSON
/// acceptance and as the element type of bare arrays/objects.
#[derive(Debug, Clone)]
pub struct JsonValue;

impl JsonValue {
    pub fn new() -> Self {
        JsonValue
    }

    fn branches(self_arc: Arc<Acceptor>) -> Vec<Arc<Acceptor>> {
        let _ = self_arc;
        vec![
            phrase("true"),
            phrase("false"),
            phrase("null"),
            Arc::new(Acceptor::StringLiteral(StringLiteral::new())),
            Arc::new(Acceptor::Number(Number::new())),
            Arc::new(Acceptor::Array(Array::new(Arc::new(Acceptor::JsonValue(
                JsonValue::new(),
            ))))),
            Arc::new(Acceptor::Object(Object::new(Arc::new(Acceptor::KeyValue(
                KeyValue::new_dynamic_key(Arc::new(Acceptor::JsonValue(JsonValue::new()))),
            ))))),
        ]
    }
}

impl Default for JsonValue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct JsonValueStepper {
    pub acceptor: JsonValue,
    branches: Vec<Stepper>,
}

impl JsonValueStepper {
    pub fn new(acceptor: JsonValue) -> Self {
        let self_arc = Arc::new(Acceptor::JsonValue(acceptor.clone()));
        let branches = JsonValue::branches(self_arc)
            .into_iter()
            .flat_map(|a| a.initial_steppers())
            .collect();
        Self { acceptor, branches }
    }

    pub fn consume_char(&self, ch: char) -> Vec<JsonValueStepper> {
        self.branches
            .iter()
            .flat_map(|s| s.consume_char(ch))
            .map(|b| JsonValueStepper {
                acceptor: self.acceptor.clone(),
                branches: vec![b],
            })
            .collect()
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.branches.iter().any(|s| s.has_reached_accept_state())
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.branches.iter().any(|s| s.can_accept_more_input())
    }

    pub fn current_value(&self) -> StepperValue {
        self.branches
            .iter()
            .find(|s| s.has_reached_accept_state())
            .map(|s| s.current_value())
            .unwrap_or_else(|| {
                self.branches
                    .first()
                    .map(|s| s.current_value())
                    .unwrap_or(StepperValue::None)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::advance_all_basic;

    #[test]
    fn array_of_numbers_round_trips() {
        let item = Arc::new(Acceptor::Number(Number::new()));
        let arr = Arc::new(Acceptor::Array(Array::new(item)));
        let steppers = arr.initial_steppers();
        let result = advance_all_basic(&steppers, "[1,2,3]");
        let accepted = result.iter().find(|s| s.has_reached_accept_state());
        assert!(accepted.is_some());
        if let Some(Stepper::Array(a)) = accepted {
            assert_eq!(a.value, vec![Json::from(1), Json::from(2), Json::from(3)]);
        }
    }

    #[test]
    fn array_respects_min_items() {
        let item = Arc::new(Acceptor::Number(Number::new()));
        let arr = Arc::new(Acceptor::Array(Array::new(item).with_bounds(2, 10)));
        let steppers = arr.initial_steppers();
        let result = advance_all_basic(&steppers, "[1]");
        assert!(!result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn key_value_parses_fixed_key() {
        let kv = Arc::new(Acceptor::KeyValue(KeyValue::new_fixed_key(
            "name",
            Arc::new(Acceptor::StringLiteral(StringLiteral::new())),
        )));
        let steppers = kv.initial_steppers();
        let result = advance_all_basic(&steppers, r#""name": "bob""#);
        let accepted = result.iter().find(|s| s.has_reached_accept_state());
        assert!(accepted.is_some());
        if let Some(Stepper::KeyValue(s)) = accepted {
            if let StepperValue::KeyValue(k, v) = s.current_value() {
                assert_eq!(k, "name");
                assert_eq!(v, Json::from("bob"));
            } else {
                panic!("expected KeyValue");
            }
        }
    }

    #[test]
    fn json_value_dispatches_to_object() {
        let jv = Arc::new(Acceptor::JsonValue(JsonValue::new()));
        let steppers = jv.initial_steppers();
        let result = advance_all_basic(&steppers, "true");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }
}
