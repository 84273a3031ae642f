//! `type: "array"` schema compilation: a homogeneous `items` schema with
//! `minItems`/`maxItems` bounds, built directly on [`crate::acceptor::json::Array`].
use crate::acceptor::json::{Array, ArrayStepper};
use crate::acceptor::Acceptor;
use std::sync::Arc;

pub const DEFAULT_MAX_ITEMS: usize = 1 << 32;

#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub array: Array,
}

impl ArraySchema {
    pub fn new(item: Arc<Acceptor>, min_items: usize, max_items: usize) -> Self {
        Self {
            array: Array::new(item).with_bounds(min_items, max_items),
        }
    }
}

pub type ArraySchemaStepper = ArrayStepper;

pub fn new_stepper(schema: &ArraySchema) -> ArraySchemaStepper {
    ArrayStepper::new(schema.array.clone())
}
