//! `type: "string"` schema compilation: length bounds, `pattern`, and a
//! restricted set of `format` validators.
use crate::acceptor::primitive::{StringLiteral, StringLiteralStepper};
use crate::value::StepperValue;
use regex_automata::dfa::{dense, Automaton};
use regex_automata::util::primitives::StateID;
use regex_automata::Input;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CreateStringSchemaError {
    #[error("unsupported string format {0:?}; only \"email\", \"date-time\", \"uri\" are supported")]
    UnsupportedFormat(String),
    #[error("invalid regex in \"pattern\": {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    DateTime,
    Uri,
}

impl StringFormat {
    fn parse(s: &str) -> Result<StringFormat, CreateStringSchemaError> {
        match s {
            "email" => Ok(StringFormat::Email),
            "date-time" => Ok(StringFormat::DateTime),
            "uri" => Ok(StringFormat::Uri),
            other => Err(CreateStringSchemaError::UnsupportedFormat(other.to_string())),
        }
    }

    fn validate(self, s: &str) -> bool {
        match self {
            StringFormat::Email => {
                let parts: Vec<&str> = s.splitn(2, '@').collect();
                parts.len() == 2 && !parts[0].is_empty() && parts[1].contains('.')
            }
            StringFormat::DateTime => {
                // RFC 3339-ish: YYYY-MM-DDTHH:MM:SS, optionally with fraction/offset.
                let bytes = s.as_bytes();
                bytes.len() >= 19
                    && bytes[4] == b'-'
                    && bytes[7] == b'-'
                    && (bytes[10] == b'T' || bytes[10] == b't')
                    && bytes[13] == b':'
                    && bytes[16] == b':'
                    && s[0..4].chars().all(|c| c.is_ascii_digit())
            }
            StringFormat::Uri => s.contains(':') && !s.starts_with(':'),
        }
    }
}

/// A compiled `pattern`, kept as a dense DFA so prefix-feasibility ("could
/// this partial string still match?") can be checked without backtracking —
/// the same DFA-state-classification approach the teacher uses for its own
/// regex terminals.
pub struct CompiledPattern {
    dfa: dense::DFA<Vec<u32>>,
    source: String,
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .finish()
    }
}

impl Clone for CompiledPattern {
    fn clone(&self) -> Self {
        CompiledPattern {
            dfa: self.dfa.clone(),
            source: self.source.clone(),
        }
    }
}

impl CompiledPattern {
    pub fn compile(pattern: &str, max_dfa_states: usize) -> Result<Self, CreateStringSchemaError> {
        let dfa = dense::Builder::new()
            .configure(dense::Config::new().dfa_size_limit(Some(max_dfa_states * 64)))
            .build(pattern)
            .map_err(|e| CreateStringSchemaError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            dfa,
            source: pattern.to_string(),
        })
    }

    /// True if `s` fully matches the pattern.
    pub fn fullmatch(&self, s: &str) -> bool {
        self.dfa
            .try_search_fwd(&Input::new(s.as_bytes()))
            .ok()
            .flatten()
            .is_some_and(|m| m.offset() == s.len())
    }

    /// True if `s` is still a feasible prefix of some string the pattern
    /// accepts, i.e. the DFA hasn't reached a dead state by the time it's
    /// consumed all of `s`.
    pub fn is_prefix_feasible(&self, s: &str) -> bool {
        let mut state: StateID = match self.dfa.start_state_forward(&Input::new(s.as_bytes())) {
            Ok(id) => id,
            Err(_) => return false,
        };
        for &b in s.as_bytes() {
            state = self.dfa.next_state(state, b);
            if self.dfa.is_dead_state(state) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct StringSchema {
    pub min_length: usize,
    pub max_length: usize,
    pub pattern: Option<Arc<CompiledPattern>>,
    pub format: Option<StringFormat>,
}

impl StringSchema {
    pub fn new() -> Self {
        Self {
            min_length: 0,
            max_length: 10000,
            pattern: None,
            format: None,
        }
    }

    pub fn with_format(mut self, format: &str) -> Result<Self, CreateStringSchemaError> {
        self.format = Some(StringFormat::parse(format)?);
        Ok(self)
    }

    pub fn with_pattern(
        mut self,
        pattern: &str,
        max_dfa_states: usize,
    ) -> Result<Self, CreateStringSchemaError> {
        self.pattern = Some(Arc::new(CompiledPattern::compile(pattern, max_dfa_states)?));
        Ok(self)
    }

    fn validate(&self, s: &str) -> bool {
        let len = s.chars().count();
        if len < self.min_length || len > self.max_length {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.fullmatch(s) {
                return false;
            }
        }
        if let Some(format) = self.format {
            if !format.validate(s) {
                return false;
            }
        }
        true
    }
}

impl Default for StringSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StringSchemaStepper {
    pub schema: StringSchema,
    pub inner: StringLiteralStepper,
}

impl StringSchemaStepper {
    pub fn new(schema: StringSchema) -> Self {
        Self {
            schema,
            inner: StringLiteralStepper::new(StringLiteral::new()),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<StringSchemaStepper> {
        self.inner
            .consume_char(ch)
            .into_iter()
            .filter(|s| {
                // Reject only once the pattern can no longer possibly
                // extend to a full match; final acceptance is re-checked
                // in full by `validate` once the literal closes.
                match (&self.schema.pattern, s.decoded()) {
                    (Some(pattern), Some(decoded)) => pattern.is_prefix_feasible(&decoded),
                    _ => true,
                }
            })
            .map(|inner| StringSchemaStepper {
                schema: self.schema.clone(),
                inner,
            })
            .collect()
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.inner.has_reached_accept_state()
            && self
                .inner
                .decoded()
                .is_some_and(|s| self.schema.validate(&s))
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.inner.can_accept_more_input()
    }

    pub fn current_value(&self) -> StepperValue {
        self.inner.current_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_rejects_infeasible_prefix() {
        let schema = StringSchema::new().with_pattern("^ab+$", 1024).unwrap();
        let mut stepper = StringSchemaStepper::new(schema);
        for ch in "\"ac".chars() {
            let next = stepper.consume_char(ch);
            assert!(next.is_empty(), "expected rejection at {ch:?}");
        }
        stepper = StringSchemaStepper::new(stepper.schema.clone());
        let mut live = vec![stepper];
        for ch in "\"abb\"".chars() {
            live = live.iter().flat_map(|s| s.consume_char(ch)).collect();
        }
        assert!(live.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn format_email_rejects_malformed() {
        let schema = StringSchema::new().with_format("email").unwrap();
        let mut live = vec![StringSchemaStepper::new(schema)];
        for ch in "\"not-an-email\"".chars() {
            live = live.iter().flat_map(|s| s.consume_char(ch)).collect();
        }
        assert!(!live.iter().any(|s| s.has_reached_accept_state()));
    }
}
