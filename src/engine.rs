//! The engine façade (C8): owns the compiled acceptor tree, the live
//! stepper set, and the vocabulary/mask bookkeeping a decoding loop drives.
use crate::acceptor::{advance_all_basic, Acceptor, Stepper};
use crate::config::{Config, Delimiters, EngineOptions};
use crate::grammar::Grammar;
use crate::mask::{build_mask, MaskResult};
use crate::schema::{CompileContext, CreateSchemaError};
use crate::value::StepperValue;
use crate::vocabulary::Vocabulary;
use crate::engine_like::{
    AcceptTokenError, AcceptTokenResult, EngineLike, MaskLogitsError, UpdateLogitsError,
    WriteBufferError,
};
use serde_json::Value as Json;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CreateEngineError {
    #[error(transparent)]
    Schema(#[from] CreateSchemaError),
}

/// A constrained-decoding engine bound to one compiled acceptor tree and
/// one vocabulary. Not `Clone`: two independent engines over the same
/// schema are built by calling [`Engine::new`] (or `configure`) twice and
/// sharing the same [`Arc<Vocabulary>`], the same way the teacher this is
/// modelled on keeps per-engine mutable state separate from shared,
/// immutable compiled structures.
pub struct Engine {
    vocab: Arc<Vocabulary>,
    config: Config,
    acceptor: Arc<Acceptor>,
    steppers: Vec<Stepper>,
    last_mask: Option<MaskResult>,
    scratchpad_done: bool,
}

impl Engine {
    /// Build an engine whose acceptor tree accepts bare JSON Schema output,
    /// with no delimiters or scratchpad.
    pub fn new(vocab: Arc<Vocabulary>, schema: &Json) -> Result<Self, CreateEngineError> {
        Self::with_config(vocab, schema, Config::default(), EngineOptions::default())
    }

    pub fn with_config(
        vocab: Arc<Vocabulary>,
        schema: &Json,
        config: Config,
        options: EngineOptions,
    ) -> Result<Self, CreateEngineError> {
        let mut ctx = CompileContext::new(config.regex_config.clone());
        let compiled = crate::schema::compile(schema, &mut ctx)?;
        let acceptor = wrap_with_options(compiled, &options);
        let steppers = acceptor.initial_steppers();
        log::debug!(
            "compiled engine with {} initial steppers",
            steppers.len()
        );
        Ok(Self {
            vocab,
            config,
            acceptor,
            steppers,
            last_mask: None,
            scratchpad_done: false,
        })
    }

    /// Build an engine around an externally-validated grammar block (§4.6)
    /// instead of a JSON Schema, optionally framed by delimiters.
    pub fn with_grammar(
        vocab: Arc<Vocabulary>,
        grammar: Grammar,
        config: Config,
        options: EngineOptions,
    ) -> Self {
        let inner = Arc::new(Acceptor::Grammar(grammar));
        let acceptor = wrap_with_options(inner, &options);
        let steppers = acceptor.initial_steppers();
        Self {
            vocab,
            config,
            acceptor,
            steppers,
            last_mask: None,
            scratchpad_done: false,
        }
    }

    fn consume_text(&mut self, text: &str) -> bool {
        let next = advance_all_basic(&self.steppers, text);
        self.steppers = next;
        self.last_mask = None;
        !self.steppers.is_empty()
    }

    /// The best-effort reconstructed output of the live stepper with the
    /// most progress: the accepted structured value if any stepper has
    /// reached an accept state, else the raw text matched so far.
    pub fn output(&self) -> StepperValue {
        self.steppers
            .iter()
            .find(|s| s.has_reached_accept_state())
            .or_else(|| self.steppers.first())
            .map(|s| s.current_value())
            .unwrap_or(StepperValue::None)
    }

    pub fn has_reached_accept_state(&self) -> bool {
        self.steppers.iter().any(|s| s.has_reached_accept_state())
    }

    fn still_alive(&self) -> bool {
        !self.steppers.is_empty()
    }
}

fn wrap_with_options(inner: Arc<Acceptor>, options: &EngineOptions) -> Arc<Acceptor> {
    if let Some(Delimiters { open, close }) = &options.delimiters {
        let buffer_length = options.buffer_length.unwrap_or(0).max(0) as usize;
        Arc::new(Acceptor::Encapsulated(crate::acceptor::Encapsulated::new(
            inner,
            open,
            close,
            buffer_length,
        )))
    } else if let Some(n) = options.buffer_length {
        if n > 0 {
            Arc::new(Acceptor::WaitFor(
                crate::acceptor::WaitFor::new(inner).with_buffer_length(n as usize),
            ))
        } else {
            inner
        }
    } else {
        inner
    }
}

impl crate::engine_like::sealed::Sealed for Engine {}

impl EngineLike for Engine {
    fn try_accept_new_token(&mut self, token_id: u32) -> Result<AcceptTokenResult, AcceptTokenError> {
        if self.has_reached_accept_state() && !self.still_alive() {
            return Err(AcceptTokenError::Finished);
        }
        // An oversized token the last `update_logits` pass couldn't allow
        // directly may still have a healing chain: a sequence of smaller,
        // legal token ids whose texts reconstruct what the sampler meant.
        // Feed those instead of the raw (illegal) token's text.
        let healing_chain = self
            .last_mask
            .as_ref()
            .and_then(|mask| mask.healing.get(&token_id).cloned());
        if let Some(chain) = healing_chain {
            for healed_id in chain {
                let Some(text) = self.vocab.token_string(healed_id) else {
                    return Err(AcceptTokenError::UnknownTokenId);
                };
                let text = text.to_string();
                if !self.consume_text(&text) {
                    return Err(AcceptTokenError::Finished);
                }
            }
        } else {
            let Some(text) = self.vocab.token_string(token_id) else {
                return Err(AcceptTokenError::UnknownTokenId);
            };
            let text = text.to_string();
            if !self.consume_text(&text) {
                return Err(AcceptTokenError::Finished);
            }
        }
        if self.has_reached_accept_state() {
            Ok(AcceptTokenResult::Finished)
        } else {
            Ok(AcceptTokenResult::Ongoing)
        }
    }

    fn try_accept_new_bytes(&mut self, bytes: &[u8]) -> Result<AcceptTokenResult, AcceptTokenError> {
        let text = std::str::from_utf8(bytes).map_err(|_| AcceptTokenError::UnknownTokenId)?;
        if !self.consume_text(text) {
            return Err(AcceptTokenError::Finished);
        }
        if self.has_reached_accept_state() {
            Ok(AcceptTokenResult::Finished)
        } else {
            Ok(AcceptTokenResult::Ongoing)
        }
    }

    fn update_logits(&mut self) -> Result<(), UpdateLogitsError> {
        if self.steppers.is_empty() {
            return Err(UpdateLogitsError::Finished);
        }
        self.last_mask = Some(build_mask(&self.steppers, &self.vocab, &self.config.healing_config));
        Ok(())
    }

    fn mask_logits(&self, logits: &mut [f32]) -> Result<(), MaskLogitsError> {
        let mask = self
            .last_mask
            .as_ref()
            .ok_or(MaskLogitsError::MaskNotComputed)?;
        if logits.len() != self.vocab.vocab_size() {
            return Err(MaskLogitsError::InvalidLogitsLength);
        }
        for (id, logit) in logits.iter_mut().enumerate() {
            if !mask.is_allowed(id as u32) {
                *logit = f32::NEG_INFINITY;
            }
        }
        Ok(())
    }

    fn allowed_token_ids_from_last_computation(&self) -> Option<&MaskResult> {
        self.last_mask.as_ref()
    }

    fn write_allowed_token_ids_to_buffer(&self, buffer: &mut Vec<u32>) -> Result<usize, WriteBufferError> {
        let mask = self
            .last_mask
            .as_ref()
            .ok_or(WriteBufferError::MaskNotComputed)?;
        let before = buffer.len();
        buffer.extend(mask.allowed.ones().map(|i| i as u32));
        Ok(buffer.len() - before)
    }

    fn write_disallowed_token_ids_to_buffer(&self, buffer: &mut Vec<u32>) -> Result<usize, WriteBufferError> {
        let mask = self
            .last_mask
            .as_ref()
            .ok_or(WriteBufferError::MaskNotComputed)?;
        let before = buffer.len();
        buffer.extend((0..self.vocab.vocab_size() as u32).filter(|&id| !mask.is_allowed(id)));
        Ok(buffer.len() - before)
    }

    fn is_finished(&self) -> bool {
        self.has_reached_accept_state() && self.steppers.iter().all(|s| !s.can_accept_more_input())
    }

    fn reset(&mut self) {
        self.steppers = self.acceptor.initial_steppers();
        self.last_mask = None;
        self.scratchpad_done = false;
    }

    fn into_boxed_engine(self: Box<Self>) -> Box<dyn EngineLike> {
        self
    }

    fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Token;
    use ahash::AHashMap;

    fn char_vocab(alphabet: &str) -> Arc<Vocabulary> {
        let mut id_to_token = AHashMap::default();
        let mut id_to_token_string = AHashMap::default();
        for (i, ch) in alphabet.chars().enumerate() {
            let s = ch.to_string();
            id_to_token.insert(i as u32, Token::from_str(&s));
            id_to_token_string.insert(i as u32, s);
        }
        Arc::new(Vocabulary::new(id_to_token, id_to_token_string).unwrap())
    }

    #[test]
    fn simple_object_schema_end_to_end() {
        let vocab = char_vocab(r#"{}":,abcdeflmnrstuyg0123456789 "#);
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
        for ch in r#"{"name": "al"}"#.chars() {
            let id = vocab.token_id(&Token::from_str(&ch.to_string())).unwrap();
            engine.try_accept_new_token(id).unwrap();
        }
        assert!(engine.has_reached_accept_state());
    }

    #[test]
    fn reset_restores_initial_state() {
        let vocab = char_vocab("{}\":,abc ");
        let schema = serde_json::json!({"type": "object", "properties": {}});
        let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
        let id = vocab.token_id(&Token::from_str("{")).unwrap();
        engine.try_accept_new_token(id).unwrap();
        assert!(!engine.has_reached_accept_state());
        engine.reset();
        assert_eq!(engine.output(), StepperValue::None);
    }
}
