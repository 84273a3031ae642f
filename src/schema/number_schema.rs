//! `type: "number"`/`"integer"` schema compilation. Numeric bounds are
//! validated only once a stepper reaches an accept state: nothing short of
//! the full literal (e.g. `"1"` inside a `minimum: 15` schema) is
//! necessarily out of range yet, so rejecting mid-parse would be unsound.
use crate::acceptor::primitive::{Number, NumberStepper};
use crate::value::StepperValue;

#[derive(Debug, Clone)]
pub struct NumberSchema {
    pub integer_only: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
}

impl NumberSchema {
    pub fn new(integer_only: bool) -> Self {
        Self {
            integer_only,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
        }
    }

    fn validate(&self, text: &str) -> bool {
        let Ok(n) = text.parse::<f64>() else {
            return false;
        };
        if let Some(min) = self.minimum {
            if n < min {
                return false;
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return false;
            }
        }
        if let Some(min) = self.exclusive_minimum {
            if n <= min {
                return false;
            }
        }
        if let Some(max) = self.exclusive_maximum {
            if n >= max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct NumberSchemaStepper {
    pub schema: NumberSchema,
    pub inner: NumberStepper,
}

impl NumberSchemaStepper {
    pub fn new(schema: NumberSchema) -> Self {
        Self {
            schema,
            inner: NumberStepper::new(Number::new()),
        }
    }

    pub fn consume_char(&self, ch: char) -> Vec<NumberSchemaStepper> {
        if self.schema.integer_only && (ch == '.' || ch == 'e' || ch == 'E') {
            return vec![];
        }
        self.inner
            .consume_char(ch)
            .into_iter()
            .map(|inner| NumberSchemaStepper {
                schema: self.schema.clone(),
                inner,
            })
            .collect()
    }

    pub fn has_reached_accept_state(&self) -> bool {
        if !self.inner.has_reached_accept_state() {
            return false;
        }
        match self.inner.current_value() {
            StepperValue::Text(text) => self.schema.validate(&text),
            _ => false,
        }
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

    fn accepts(schema: NumberSchema, text: &str) -> bool {
        let mut live = vec![NumberSchemaStepper::new(schema)];
        for ch in text.chars() {
            live = live.iter().flat_map(|s| s.consume_char(ch)).collect();
            if live.is_empty() {
                return false;
            }
        }
        live.iter().any(|s| s.has_reached_accept_state())
    }

    #[test]
    fn integer_only_rejects_decimal_point() {
        let schema = NumberSchema::new(true);
        assert!(!accepts(schema, "3.5"));
    }

    #[test]
    fn minimum_bound_enforced_at_accept() {
        let mut schema = NumberSchema::new(false);
        schema.minimum = Some(10.0);
        assert!(!accepts(schema.clone(), "5"));
        assert!(accepts(schema, "15"));
    }
}
