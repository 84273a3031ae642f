//! External grammar validators (C6): bridges a caller-supplied incremental
//! validator (for languages this crate doesn't model directly, e.g. Python
//! or Bash source fenced inside a larger document) into the acceptor tree.
use crate::value::StepperValue;
use std::fmt;
use std::sync::Arc;

/// The verdict an external [`GrammarValidator`] returns for a candidate
/// source string. `MaybeAccept` means the string is syntactically
/// incomplete but not yet invalid — more input could still make it valid;
/// `Accept` means it is already a complete, valid program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarVerdict {
    Accept,
    MaybeAccept,
    Reject,
}

/// A closure that incrementally validates source text against an external
/// grammar. Called with the full text matched so far on every character;
/// implementations are expected to be cheap enough for that (e.g. a
/// recursive-descent parser run to EOF-or-error, not a from-scratch full
/// compile). The `strict` flag distinguishes the two questions a decoding
/// loop asks: `strict = false` ("is this still a live prefix?", asked on
/// every character) and `strict = true` ("is this a complete, valid
/// program as it stands?", asked only when deciding whether the block may
/// close).
pub type GrammarValidator = Arc<dyn Fn(&str, bool) -> GrammarVerdict + Send + Sync>;

/// An acceptor wrapping an external validator. The acceptor itself carries
/// no grammar knowledge; every character is provisionally accepted and
/// handed to `validator`, which decides whether the accumulated text is
/// still a live prefix.
#[derive(Clone)]
pub struct Grammar {
    pub validator: GrammarValidator,
    pub name: &'static str,
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar").field("name", &self.name).finish()
    }
}

impl Grammar {
    pub fn new(name: &'static str, validator: GrammarValidator) -> Self {
        Self { validator, name }
    }
}

#[derive(Clone)]
pub struct GrammarStepper {
    pub acceptor: Grammar,
    pub text: String,
    pub verdict: GrammarVerdict,
}

impl fmt::Debug for GrammarStepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarStepper")
            .field("name", &self.acceptor.name)
            .field("text", &self.text)
            .field("verdict", &self.verdict)
            .finish()
    }
}

impl GrammarStepper {
    pub fn new(acceptor: Grammar) -> Self {
        let verdict = (acceptor.validator)("", false);
        Self {
            acceptor,
            text: String::new(),
            verdict,
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<GrammarStepper> {
        let mut text = self.text.clone();
        text.push(ch);
        let verdict = (self.acceptor.validator)(&text, false);
        match verdict {
            GrammarVerdict::Reject => vec![],
            _ => vec![GrammarStepper {
                acceptor: self.acceptor.clone(),
                text,
                verdict,
            }],
        }
    }

    /// Re-validates the accumulated text with `strict = true` rather than
    /// relying on the lenient verdict cached from `consume_char`: a grammar
    /// block may look like a live prefix the whole way through and only
    /// become genuinely complete on the final character.
    pub fn has_reached_accept_state(&self) -> bool {
        (self.acceptor.validator)(&self.text, true) == GrammarVerdict::Accept
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.verdict != GrammarVerdict::Reject
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::{advance_all_basic, Acceptor};

    fn balanced_parens_validator() -> GrammarValidator {
        Arc::new(|s: &str, strict: bool| {
            let mut depth: i32 = 0;
            for ch in s.chars() {
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth < 0 {
                            return GrammarVerdict::Reject;
                        }
                    }
                    _ => return GrammarVerdict::Reject,
                }
            }
            if !strict {
                return GrammarVerdict::MaybeAccept;
            }
            if depth == 0 && !s.is_empty() {
                GrammarVerdict::Accept
            } else {
                GrammarVerdict::MaybeAccept
            }
        })
    }

    #[test]
    fn accepts_balanced_parens() {
        let acceptor = Arc::new(Acceptor::Grammar(Grammar::new(
            "parens",
            balanced_parens_validator(),
        )));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "(())");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn rejects_invalid_character() {
        let acceptor = Arc::new(Acceptor::Grammar(Grammar::new(
            "parens",
            balanced_parens_validator(),
        )));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "(x)");
        assert!(result.is_empty());
    }
}
