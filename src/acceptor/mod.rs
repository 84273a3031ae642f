//! The nondeterministic state-machine core (C3): the [`Acceptor`] tree, the
//! [`Stepper`] values that walk it, and the free functions that drive a live
//! stepper set across an input string.
//!
//! Acceptors and steppers are both single sum types rather than trait
//! objects. Every acceptor kind has different associated data (a phrase's
//! literal, a loop's bounds, an object schema's property map), so a trait
//! object would need `dyn Any` downcasting to get anything useful back out;
//! a sum type keeps `match` exhaustive and keeps steppers cheaply `Clone`,
//! which the branching model depends on (spec.md §3: "steppers are values").
pub mod composite;
pub mod json;
pub mod primitive;

use crate::value::StepperValue;
use std::sync::Arc;

pub use composite::{Chain, Encapsulated, Loop, WaitFor};
pub use json::{Array, JsonValue, KeyValue, Object};
pub use primitive::{Character, Integer, Number, Phrase, StringLiteral, Whitespace};

/// An immutable grammar fragment. Trees of these are built once at
/// `configure` time and shared via `Arc` by every stepper descended from them.
#[derive(Debug, Clone)]
pub enum Acceptor {
    /// Matches a fixed literal string (§4.1).
    Phrase(Phrase),
    /// Matches one or more characters from a whitelist/blacklist/graylist (§4.1).
    Character(Character),
    /// [`Character`] specialised to JSON whitespace (§4.1).
    Whitespace(Whitespace),
    /// [`Character`] specialised to decimal digits, with leading-zero bookkeeping (§4.1).
    Integer(Integer),
    /// A JSON number: sign, integer part, optional fraction, optional exponent (§4.1).
    Number(Number),
    /// A JSON string literal, including escape sequences (§4.1).
    StringLiteral(StringLiteral),
    /// Accepts each sub-acceptor in sequence (§4.2).
    Chain(Chain),
    /// Repeats an inner acceptor between `min` and `max` times (§4.2).
    Loop(Loop),
    /// Buffers free text until a target acceptor's opening matches (§4.2).
    WaitFor(WaitFor),
    /// A fenced block: `WaitFor(open)`, then `inner`, then `close` (§4.2).
    Encapsulated(Encapsulated),
    /// A JSON object (§4.4).
    Object(Object),
    /// A JSON array (§4.4).
    Array(Array),
    /// A JSON object member: `"key": value` (§4.4).
    KeyValue(KeyValue),
    /// Dispatches to whichever JSON value type matches next (§4.4).
    JsonValue(JsonValue),
    /// A JSON-Schema-compiled acceptor; see [`crate::schema`] (§4.5).
    Schema(crate::schema::SchemaAcceptor),
    /// An external grammar validator wrapped as an acceptor (§4.6).
    Grammar(crate::grammar::Grammar),
}

impl Acceptor {
    /// Whether this acceptor may be skipped entirely with no input consumed.
    pub fn is_optional(&self) -> bool {
        match self {
            Acceptor::Phrase(p) => p.is_optional,
            Acceptor::Loop(l) => l.min_count == 0,
            Acceptor::Schema(s) => s.is_optional(),
            _ => false,
        }
    }

    /// The initial live steppers for this acceptor: normally a single fresh
    /// stepper, but an optional acceptor also yields an already-accepted,
    /// zero-consumption stepper alongside it (spec.md §4.3 edge semantics).
    pub fn initial_steppers(self: &Arc<Self>) -> Vec<Stepper> {
        let mut out = vec![Stepper::fresh(self)];
        if self.is_optional() {
            out.push(Stepper::empty_accepted(self));
        }
        out
    }
}

/// A live parse position inside an [`Acceptor`]. Cloning produces an
/// independent position (spec.md §3: steppers are values).
#[derive(Debug, Clone)]
pub enum Stepper {
    Phrase(primitive::PhraseStepper),
    Character(primitive::CharacterStepper),
    Integer(primitive::IntegerStepper),
    Number(primitive::NumberStepper),
    StringLiteral(primitive::StringLiteralStepper),
    Chain(composite::ChainStepper),
    Loop(composite::LoopStepper),
    WaitFor(composite::WaitForStepper),
    Encapsulated(composite::EncapsulatedStepper),
    Object(json::ObjectStepper),
    Array(json::ArrayStepper),
    KeyValue(json::KeyValueStepper),
    JsonValue(json::JsonValueStepper),
    Schema(crate::schema::SchemaStepper),
    Grammar(crate::grammar::GrammarStepper),
    /// A stepper for an optional acceptor that has accepted the empty string
    /// and consumed nothing yet. Dies (is replaced) the instant real input
    /// starts a fresh attempt at the wrapped acceptor instead.
    EmptyAccepted(Arc<Acceptor>),
}

impl Stepper {
    /// Build a fresh (no input consumed) stepper for `acceptor`.
    pub fn fresh(acceptor: &Arc<Acceptor>) -> Stepper {
        match acceptor.as_ref() {
            Acceptor::Phrase(a) => Stepper::Phrase(primitive::PhraseStepper::new(a.clone())),
            Acceptor::Character(a) => {
                Stepper::Character(primitive::CharacterStepper::new(a.clone()))
            }
            Acceptor::Whitespace(a) => {
                Stepper::Character(primitive::CharacterStepper::new(a.0.clone()))
            }
            Acceptor::Integer(a) => Stepper::Integer(primitive::IntegerStepper::new(a.clone())),
            Acceptor::Number(a) => Stepper::Number(primitive::NumberStepper::new(a.clone())),
            Acceptor::StringLiteral(a) => {
                Stepper::StringLiteral(primitive::StringLiteralStepper::new(a.clone()))
            }
            Acceptor::Chain(a) => Stepper::Chain(composite::ChainStepper::new(a.clone())),
            Acceptor::Loop(a) => Stepper::Loop(composite::LoopStepper::new(a.clone())),
            Acceptor::WaitFor(a) => Stepper::WaitFor(composite::WaitForStepper::new(a.clone())),
            Acceptor::Encapsulated(a) => {
                Stepper::Encapsulated(composite::EncapsulatedStepper::new(a.clone()))
            }
            Acceptor::Object(a) => Stepper::Object(json::ObjectStepper::new(a.clone())),
            Acceptor::Array(a) => Stepper::Array(json::ArrayStepper::new(a.clone())),
            Acceptor::KeyValue(a) => Stepper::KeyValue(json::KeyValueStepper::new(a.clone())),
            Acceptor::JsonValue(a) => Stepper::JsonValue(json::JsonValueStepper::new(a.clone())),
            Acceptor::Schema(a) => Stepper::Schema(a.new_stepper()),
            Acceptor::Grammar(a) => Stepper::Grammar(crate::grammar::GrammarStepper::new(a.clone())),
        }
    }

    /// An already-accepted stepper representing "this optional acceptor was skipped".
    pub fn empty_accepted(acceptor: &Arc<Acceptor>) -> Stepper {
        Stepper::EmptyAccepted(acceptor.clone())
    }

    /// Feed one character, returning every resulting live branch. A branch is
    /// considered live if it can still accept more input, has reached an
    /// accept state, or both — exactly the nondeterminism spec.md §4.3
    /// describes for `"Hello"` with an optional trailing `!`.
    pub fn consume_char(&self, ch: char) -> Vec<Stepper> {
        match self {
            Stepper::Phrase(s) => s.consume_char(ch).into_iter().map(Stepper::Phrase).collect(),
            Stepper::Character(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::Character)
                .collect(),
            Stepper::Integer(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::Integer)
                .collect(),
            Stepper::Number(s) => s.consume_char(ch).into_iter().map(Stepper::Number).collect(),
            Stepper::StringLiteral(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::StringLiteral)
                .collect(),
            Stepper::Chain(s) => s.consume_char(ch).into_iter().map(Stepper::Chain).collect(),
            Stepper::Loop(s) => s.consume_char(ch).into_iter().map(Stepper::Loop).collect(),
            Stepper::WaitFor(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::WaitFor)
                .collect(),
            Stepper::Encapsulated(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::Encapsulated)
                .collect(),
            Stepper::Object(s) => s.consume_char(ch).into_iter().map(Stepper::Object).collect(),
            Stepper::Array(s) => s.consume_char(ch).into_iter().map(Stepper::Array).collect(),
            Stepper::KeyValue(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::KeyValue)
                .collect(),
            Stepper::JsonValue(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::JsonValue)
                .collect(),
            Stepper::Schema(s) => s.consume_char(ch).into_iter().map(Stepper::Schema).collect(),
            Stepper::Grammar(s) => s
                .consume_char(ch)
                .into_iter()
                .map(Stepper::Grammar)
                .collect(),
            Stepper::EmptyAccepted(acceptor) => Stepper::fresh(acceptor).consume_char(ch),
        }
    }

    /// True iff this stepper is in an accept state: a terminal position for
    /// its acceptor, with no sub-stepper pending.
    pub fn has_reached_accept_state(&self) -> bool {
        match self {
            Stepper::Phrase(s) => s.has_reached_accept_state(),
            Stepper::Character(s) => s.has_reached_accept_state(),
            Stepper::Integer(s) => s.has_reached_accept_state(),
            Stepper::Number(s) => s.has_reached_accept_state(),
            Stepper::StringLiteral(s) => s.has_reached_accept_state(),
            Stepper::Chain(s) => s.has_reached_accept_state(),
            Stepper::Loop(s) => s.has_reached_accept_state(),
            Stepper::WaitFor(s) => s.has_reached_accept_state(),
            Stepper::Encapsulated(s) => s.has_reached_accept_state(),
            Stepper::Object(s) => s.has_reached_accept_state(),
            Stepper::Array(s) => s.has_reached_accept_state(),
            Stepper::KeyValue(s) => s.has_reached_accept_state(),
            Stepper::JsonValue(s) => s.has_reached_accept_state(),
            Stepper::Schema(s) => s.has_reached_accept_state(),
            Stepper::Grammar(s) => s.has_reached_accept_state(),
            Stepper::EmptyAccepted(_) => true,
        }
    }

    /// True iff further characters could still extend this stepper.
    pub fn can_accept_more_input(&self) -> bool {
        match self {
            Stepper::Phrase(s) => s.can_accept_more_input(),
            Stepper::Character(s) => s.can_accept_more_input(),
            Stepper::Integer(s) => s.can_accept_more_input(),
            Stepper::Number(s) => s.can_accept_more_input(),
            Stepper::StringLiteral(s) => s.can_accept_more_input(),
            Stepper::Chain(s) => s.can_accept_more_input(),
            Stepper::Loop(s) => s.can_accept_more_input(),
            Stepper::WaitFor(s) => s.can_accept_more_input(),
            Stepper::Encapsulated(s) => s.can_accept_more_input(),
            Stepper::Object(s) => s.can_accept_more_input(),
            Stepper::Array(s) => s.can_accept_more_input(),
            Stepper::KeyValue(s) => s.can_accept_more_input(),
            Stepper::JsonValue(s) => s.can_accept_more_input(),
            Stepper::Schema(s) => s.can_accept_more_input(),
            Stepper::Grammar(s) => s.can_accept_more_input(),
            Stepper::EmptyAccepted(acceptor) => acceptor.is_optional(),
        }
    }

    /// The value reconstructed from this stepper's consumed input so far.
    pub fn current_value(&self) -> StepperValue {
        match self {
            Stepper::Phrase(s) => s.current_value(),
            Stepper::Character(s) => s.current_value(),
            Stepper::Integer(s) => s.current_value(),
            Stepper::Number(s) => s.current_value(),
            Stepper::StringLiteral(s) => s.current_value(),
            Stepper::Chain(s) => s.current_value(),
            Stepper::Loop(s) => s.current_value(),
            Stepper::WaitFor(s) => s.current_value(),
            Stepper::Encapsulated(s) => s.current_value(),
            Stepper::Object(s) => s.current_value(),
            Stepper::Array(s) => s.current_value(),
            Stepper::KeyValue(s) => s.current_value(),
            Stepper::JsonValue(s) => s.current_value(),
            Stepper::Schema(s) => s.current_value(),
            Stepper::Grammar(s) => s.current_value(),
            Stepper::EmptyAccepted(_) => StepperValue::None,
        }
    }

    /// The raw text this stepper has matched so far, when that's a
    /// meaningful notion for its acceptor kind (used to compare steppers for
    /// merge-equality and to reconstruct scratchpads).
    pub fn raw_text(&self) -> String {
        match self.current_value() {
            StepperValue::Text(s) => s,
            StepperValue::Json(v) => v.to_string(),
            StepperValue::KeyValue(k, v) => format!("{k:?}:{v}"),
            StepperValue::None => String::new(),
        }
    }
}

/// Feed a whole string through a live stepper set one character at a time,
/// merging value-equal steppers after each character (spec.md §4.3 "Merging";
/// §8 invariant 4, "merge minimality"; §8 invariant 6, "idempotence" — this
/// is also exactly why bulk and character-by-character consumption agree:
/// bulk consumption *is* character-by-character consumption under the hood).
pub fn advance_all_basic(steppers: &[Stepper], text: &str) -> Vec<Stepper> {
    let mut live: Vec<Stepper> = steppers.to_vec();
    for ch in text.chars() {
        let mut next = Vec::new();
        for s in &live {
            next.extend(s.consume_char(ch));
        }
        live = merge(next);
        if live.is_empty() {
            break;
        }
    }
    live
}

/// Collapse steppers that are equal by `(raw_text, has_reached_accept_state,
/// can_accept_more_input)` — a coarse but sound approximation of spec.md's
/// "equal iff machine, state, value, and sub-stepper are equal": two
/// steppers that have consumed the same text and offer the same future
/// continue/accept behavior are interchangeable with respect to everything
/// the engine (mask building, output reconstruction) observes about them.
pub fn merge(steppers: Vec<Stepper>) -> Vec<Stepper> {
    let mut out: Vec<Stepper> = Vec::with_capacity(steppers.len());
    for s in steppers {
        let key = (
            s.raw_text(),
            s.has_reached_accept_state(),
            s.can_accept_more_input(),
        );
        let dup = out.iter().any(|o| {
            (o.raw_text(), o.has_reached_accept_state(), o.can_accept_more_input()) == key
        });
        if !dup {
            out.push(s);
        }
    }
    out
}
