//! The accumulated value carried by a stepper as it consumes text.
use serde_json::Value as Json;

/// What a stepper has parsed so far, reconstructed from its sub-stepper history.
///
/// Most acceptors only ever produce [`StepperValue::Text`] (the raw matched
/// text) or [`StepperValue::Json`] (a fully decoded JSON value once the
/// stepper reaches an accept state). [`StepperValue::KeyValue`] is specific
/// to object members, which need to carry the key alongside the value before
/// the owning object can merge it into its accumulated map.
#[derive(Debug, Clone, PartialEq)]
pub enum StepperValue {
    /// No input has been consumed yet.
    None,
    /// Raw matched text, for acceptors that don't interpret their content
    /// (phrases, character classes, grammar-bridged source).
    Text(String),
    /// A fully decoded JSON value.
    Json(Json),
    /// A decoded `(key, value)` pair, produced by [`KeyValue`](crate::acceptor::json::KeyValue) steppers.
    KeyValue(String, Json),
}

impl StepperValue {
    /// Borrow the raw text, if this value is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StepperValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert into a JSON value. Text is parsed as a JSON string literal
    /// fallback only when it already looks like valid JSON; callers that need
    /// a guaranteed conversion should prefer [`StepperValue::Json`] directly.
    pub fn into_json(self) -> Option<Json> {
        match self {
            StepperValue::Json(v) => Some(v),
            StepperValue::KeyValue(_, v) => Some(v),
            StepperValue::Text(s) => serde_json::from_str(&s).ok(),
            StepperValue::None => None,
        }
    }

    /// True if no input has been consumed at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, StepperValue::None)
    }
}

impl Default for StepperValue {
    fn default() -> Self {
        StepperValue::None
    }
}
