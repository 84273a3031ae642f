//! The public engine contract (C8): every operation a caller drives a
//! decoding loop through, plus the per-operation error taxonomy.
use crate::mask::MaskResult;
use crate::vocabulary::Vocabulary;
use displaydoc::Display;
use std::sync::Arc;

/// An error returned by [`EngineLike::try_accept_new_token`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptTokenError {
    /// the token id is not present in the vocabulary
    UnknownTokenId,
    /// the engine has already reached an accept state and stopped accepting input
    Finished,
}

/// The outcome of [`EngineLike::try_accept_new_token`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptTokenResult {
    /// the token was accepted and the engine may still accept more input
    Ongoing,
    /// the token was accepted and the engine has reached an accept state
    Finished,
}

/// An error returned by [`EngineLike::mask_logits`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskLogitsError {
    /// the logits buffer length does not match the vocabulary size
    InvalidLogitsLength,
    /// no mask has been computed yet; call `update_logits` first
    MaskNotComputed,
}

/// An error returned by [`EngineLike::write_allowed_token_ids_to_buffer`] /
/// `write_disallowed_token_ids_to_buffer`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteBufferError {
    /// no mask has been computed yet; call `update_logits` first
    MaskNotComputed,
}

/// An error returned by [`EngineLike::update_logits`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateLogitsError {
    /// the engine has already reached an accept state and stopped accepting input
    Finished,
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// The operations a decoding loop drives an engine through: accept a
/// sampled token, compute/apply a logits mask, and read back the parsed
/// output. Sealed so external crates can't implement it against a future,
/// differently-shaped internal engine.
pub trait EngineLike: sealed::Sealed {
    /// Feed a single already-sampled token id, advancing every live stepper
    /// through its decoded text.
    fn try_accept_new_token(&mut self, token_id: u32) -> Result<AcceptTokenResult, AcceptTokenError>;

    /// Feed raw bytes directly (bypassing vocabulary lookup), e.g. for
    /// tokenizer-agnostic callers that already have decoded text.
    fn try_accept_new_bytes(&mut self, bytes: &[u8]) -> Result<AcceptTokenResult, AcceptTokenError>;

    /// Recompute the mask/healing table from the current live stepper set.
    fn update_logits(&mut self) -> Result<(), UpdateLogitsError>;

    /// Zero out (or add `-inf` to) every disallowed entry in `logits`,
    /// in place, using the most recently computed mask.
    fn mask_logits(&self, logits: &mut [f32]) -> Result<(), MaskLogitsError>;

    /// The mask computed by the most recent `update_logits` call, if any.
    fn allowed_token_ids_from_last_computation(&self) -> Option<&MaskResult>;

    /// Write every allowed token id into `buffer`, returning the count written.
    fn write_allowed_token_ids_to_buffer(&self, buffer: &mut Vec<u32>) -> Result<usize, WriteBufferError>;

    /// Write every disallowed token id into `buffer`, returning the count written.
    fn write_disallowed_token_ids_to_buffer(&self, buffer: &mut Vec<u32>) -> Result<usize, WriteBufferError>;

    /// True if any live stepper has reached an accept state and the engine
    /// is not waiting on more required input.
    fn is_finished(&self) -> bool;

    /// Reset the engine back to its configured initial stepper set.
    fn reset(&mut self);

    /// Move this engine behind a `Box<dyn EngineLike>`.
    fn into_boxed_engine(self: Box<Self>) -> Box<dyn EngineLike>;

    /// The vocabulary this engine was constructed with.
    fn vocab(&self) -> &Arc<Vocabulary>;
}
