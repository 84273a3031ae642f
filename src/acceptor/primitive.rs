//! Primitive acceptors (C1): phrases, character classes, whitespace,
//! integers, numbers, and JSON string literals.
use crate::value::StepperValue;
use std::collections::HashSet;

/// Matches a fixed literal string, optionally case-insensitively.
#[derive(Debug, Clone)]
pub struct Phrase {
    pub literal: Vec<char>,
    pub case_sensitive: bool,
    pub is_optional: bool,
}

impl Phrase {
    pub fn new(literal: &str) -> Self {
        Self {
            literal: literal.chars().collect(),
            case_sensitive: true,
            is_optional: false,
        }
    }

    pub fn optional(literal: &str) -> Self {
        let mut p = Self::new(literal);
        p.is_optional = true;
        p
    }
}

#[derive(Debug, Clone)]
pub struct PhraseStepper {
    pub acceptor: Phrase,
    pub pos: usize,
}

impl PhraseStepper {
    pub fn new(acceptor: Phrase) -> Self {
        Self { acceptor, pos: 0 }
    }

    fn chars_match(&self, a: char, b: char) -> bool {
        if self.acceptor.case_sensitive {
            a == b
        } else {
            a.to_ascii_lowercase() == b.to_ascii_lowercase()
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<PhraseStepper> {
        if self.pos >= self.acceptor.literal.len() {
            return vec![];
        }
        if self.chars_match(self.acceptor.literal[self.pos], ch) {
            vec![PhraseStepper {
                acceptor: self.acceptor.clone(),
                pos: self.pos + 1,
            }]
        } else {
            vec![]
        }
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.pos == self.acceptor.literal.len()
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.pos < self.acceptor.literal.len()
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.acceptor.literal[..self.pos].iter().collect())
    }
}

/// Matches one or more characters from a whitelist/blacklist/graylist,
/// bounded by `min`/`max` length.
#[derive(Debug, Clone)]
pub struct Character {
    pub whitelist: Option<HashSet<char>>,
    pub blacklist: HashSet<char>,
    /// Allowed only when no whitelist-valid character could still extend the
    /// match (i.e. the stepper is already at `max`, or has no whitelist at
    /// all) — used to disambiguate against tighter sibling acceptors.
    pub graylist: HashSet<char>,
    pub char_min: usize,
    pub char_max: usize,
}

impl Character {
    pub fn new(whitelist: Option<HashSet<char>>, char_min: usize, char_max: usize) -> Self {
        Self {
            whitelist,
            blacklist: HashSet::new(),
            graylist: HashSet::new(),
            char_min,
            char_max,
        }
    }

    fn allows(&self, ch: char, already_consumed: usize) -> bool {
        if self.blacklist.contains(&ch) {
            return false;
        }
        match &self.whitelist {
            Some(set) if set.contains(&ch) => true,
            Some(_) => self.graylist.contains(&ch) && already_consumed + 1 >= self.char_max,
            None => true,
        }
    }
}

/// [`Character`] specialised to JSON whitespace: space, tab, CR, LF; `min=0, max=40`.
#[derive(Debug, Clone)]
pub struct Whitespace(pub Character);

impl Whitespace {
    pub fn new() -> Self {
        Whitespace(Character::new(
            Some([' ', '\t', '\n', '\r'].into_iter().collect()),
            0,
            40,
        ))
    }

    pub fn bounded(max: usize) -> Self {
        Whitespace(Character::new(
            Some([' ', '\t', '\n', '\r'].into_iter().collect()),
            0,
            max,
        ))
    }
}

impl Default for Whitespace {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CharacterStepper {
    pub acceptor: Character,
    pub consumed: String,
}

impl CharacterStepper {
    pub fn new(acceptor: Character) -> Self {
        Self {
            acceptor,
            consumed: String::new(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<CharacterStepper> {
        let count = self.consumed.chars().count();
        if count >= self.acceptor.char_max {
            return vec![];
        }
        if !self.acceptor.allows(ch, count) {
            return vec![];
        }
        let mut consumed = self.consumed.clone();
        consumed.push(ch);
        vec![CharacterStepper {
            acceptor: self.acceptor.clone(),
            consumed,
        }]
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.consumed.chars().count() >= self.acceptor.char_min
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.consumed.chars().count() < self.acceptor.char_max
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.consumed.clone())
    }
}

/// [`Character`] specialised to decimal digits. `drop_leading_zeros`
/// controls whether [`current_value`](IntegerStepper::current_value) strips
/// insignificant leading zeros (e.g. for a bare JSON integer) or preserves
/// them (e.g. inside a larger literal that already validated their presence).
#[derive(Debug, Clone)]
pub struct Integer {
    pub char_min: usize,
    pub char_max: usize,
    pub drop_leading_zeros: bool,
}

impl Integer {
    pub fn new() -> Self {
        Self {
            char_min: 1,
            char_max: usize::MAX,
            drop_leading_zeros: false,
        }
    }
}

impl Default for Integer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct IntegerStepper {
    pub acceptor: Integer,
    pub consumed: String,
}

impl IntegerStepper {
    pub fn new(acceptor: Integer) -> Self {
        Self {
            acceptor,
            consumed: String::new(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<IntegerStepper> {
        if !ch.is_ascii_digit() || self.consumed.len() >= self.acceptor.char_max {
            return vec![];
        }
        let mut consumed = self.consumed.clone();
        consumed.push(ch);
        vec![IntegerStepper {
            acceptor: self.acceptor.clone(),
            consumed,
        }]
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.consumed.len() >= self.acceptor.char_min
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.consumed.len() < self.acceptor.char_max
    }

    pub fn current_value(&self) -> StepperValue {
        if self.acceptor.drop_leading_zeros {
            let trimmed = self.consumed.trim_start_matches('0');
            let s = if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            };
            StepperValue::Text(s)
        } else {
            StepperValue::Text(self.consumed.clone())
        }
    }
}

/// A JSON number: `-?` integer `(.digits)?` `([eE][+-]?digits)?`.
/// States follow spec.md §4.1: 0 optional sign, 1 integer part, 2 optional
/// fraction, 3 optional exponent prefix, 4 optional exponent sign, 5 exponent
/// digits, with end states `{2, 3, 5}` mapped onto the phases below so that
/// integers, decimals, and exponentials all accept.
#[derive(Debug, Clone)]
pub struct Number;

impl Number {
    pub fn new() -> Self {
        Number
    }
}

impl Default for Number {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NumPhase {
    Sign,
    IntDigits,
    DotOrExpOrEnd,
    FracDigits,
    ExpSign,
    ExpDigits,
}

#[derive(Debug, Clone)]
pub struct NumberStepper {
    phase: NumPhase,
    text: String,
}

impl NumberStepper {
    pub fn new(_acceptor: Number) -> Self {
        Self {
            phase: NumPhase::Sign,
            text: String::new(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<NumberStepper> {
        use NumPhase::*;
        let mut push = |phase: NumPhase| {
            let mut text = self.text.clone();
            text.push(ch);
            NumberStepper { phase, text }
        };
        match (&self.phase, ch) {
            (Sign, '-') => vec![push(IntDigits)],
            (Sign, c) if c.is_ascii_digit() => vec![push(if c == '0' {
                DotOrExpOrEnd
            } else {
                IntDigits
            })],
            (IntDigits, '0') if self.text.ends_with('-') => vec![push(DotOrExpOrEnd)],
            (IntDigits, c) if c.is_ascii_digit() => vec![push(IntDigits)],
            (IntDigits, '.') => vec![push(FracDigits)],
            (IntDigits, 'e') | (IntDigits, 'E') => vec![push(ExpSign)],
            (DotOrExpOrEnd, '.') => vec![push(FracDigits)],
            (DotOrExpOrEnd, 'e') | (DotOrExpOrEnd, 'E') => vec![push(ExpSign)],
            (FracDigits, c) if c.is_ascii_digit() => vec![push(FracDigits)],
            (ExpSign, '+') | (ExpSign, '-') => vec![push(ExpDigits)],
            (ExpSign, c) if c.is_ascii_digit() => vec![push(ExpDigits)],
            (ExpDigits, c) if c.is_ascii_digit() => vec![push(ExpDigits)],
            _ => vec![],
        }
    }

    pub fn has_reached_accept_state(&self) -> bool {
        use NumPhase::*;
        match self.phase {
            IntDigits | DotOrExpOrEnd | FracDigits | ExpDigits => true,
            Sign | ExpSign => false,
        }
    }

    pub fn can_accept_more_input(&self) -> bool {
        true
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.text.clone())
    }

    /// Whether this stepper is still strictly inside the integer portion
    /// (no `.` or exponent seen yet) — used by [`crate::schema::number_schema`]
    /// to reject a `.`/`e` transition when the schema type is `integer`.
    pub fn is_integral(&self) -> bool {
        matches!(self.phase, NumPhase::IntDigits | NumPhase::DotOrExpOrEnd)
    }
}

/// A JSON string literal: `"`, a loop of unescaped characters or escapes, `"`.
/// Invalid raw characters: ASCII control characters (`< 0x20`), raw `"`, raw `\`.
#[derive(Debug, Clone)]
pub struct StringLiteral;

impl StringLiteral {
    pub fn new() -> Self {
        StringLiteral
    }
}

impl Default for StringLiteral {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StrPhase {
    Open,
    Body,
    Escape,
    UnicodeEscape(u8),
    Closed,
}

#[derive(Debug, Clone)]
pub struct StringLiteralStepper {
    phase: StrPhase,
    raw: String,
}

impl StringLiteralStepper {
    pub fn new(_acceptor: StringLiteral) -> Self {
        Self {
            phase: StrPhase::Open,
            raw: String::new(),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<StringLiteralStepper> {
        use StrPhase::*;
        let mut with = |phase: StrPhase| {
            let mut raw = self.raw.clone();
            raw.push(ch);
            StringLiteralStepper { phase, raw }
        };
        match &self.phase {
            Open if ch == '"' => vec![with(Body)],
            Open => vec![],
            Body if ch == '"' => vec![with(Closed)],
            Body if ch == '\\' => vec![with(Escape)],
            Body if (ch as u32) < 0x20 => vec![],
            Body => vec![with(Body)],
            Escape if "\"\\/bfnrt".contains(ch) => vec![with(Body)],
            Escape if ch == 'u' => vec![with(UnicodeEscape(4))],
            Escape => vec![],
            UnicodeEscape(remaining) if ch.is_ascii_hexdigit() => {
                if *remaining <= 1 {
                    vec![with(Body)]
                } else {
                    vec![with(UnicodeEscape(remaining - 1))]
                }
            }
            UnicodeEscape(_) => vec![],
            Closed => vec![],
        }
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.phase == StrPhase::Closed
    }

    pub fn can_accept_more_input(&self) -> bool {
        self.phase != StrPhase::Closed
    }

    pub fn current_value(&self) -> StepperValue {
        StepperValue::Text(self.raw.clone())
    }

    /// The decoded string content (without surrounding quotes), once closed.
    pub fn decoded(&self) -> Option<String> {
        if self.phase != StrPhase::Closed {
            return None;
        }
        serde_json::from_str::<String>(&self.raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::advance_all_basic;
    use crate::acceptor::{Acceptor, Stepper};
    use std::sync::Arc;

    #[test]
    fn phrase_matches_literal() {
        let acceptor = Arc::new(Acceptor::Phrase(Phrase::new("hi")));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "hi");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn phrase_rejects_mismatch() {
        let acceptor = Arc::new(Acceptor::Phrase(Phrase::new("hi")));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "bye");
        assert!(result.is_empty());
    }

    #[test]
    fn number_accepts_integer_decimal_and_exponent() {
        for text in ["15", "-3.25", "2e10", "2E-3"] {
            let acceptor = Arc::new(Acceptor::Number(Number::new()));
            let steppers = acceptor.initial_steppers();
            let result = advance_all_basic(&steppers, text);
            assert!(
                result.iter().any(|s| s.has_reached_accept_state()),
                "failed for {text}"
            );
        }
    }

    #[test]
    fn number_rejects_leading_dot() {
        let acceptor = Arc::new(Acceptor::Number(Number::new()));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, ".5");
        assert!(result.is_empty());
    }

    #[test]
    fn string_literal_round_trips_escapes() {
        let acceptor = Arc::new(Acceptor::StringLiteral(StringLiteral::new()));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, r#""a\nb""#);
        let accepted = result.iter().find(|s| s.has_reached_accept_state());
        assert!(accepted.is_some());
        if let Some(Stepper::StringLiteral(s)) = accepted {
            assert_eq!(s.decoded().unwrap(), "a\nb");
        } else {
            panic!("expected StringLiteral stepper");
        }
    }

    #[test]
    fn string_literal_rejects_raw_control_char() {
        let acceptor = Arc::new(Acceptor::StringLiteral(StringLiteral::new()));
        let steppers = acceptor.initial_steppers();
        let result = advance_all_basic(&steppers, "\"a\nb\"");
        assert!(result.is_empty());
    }
}
