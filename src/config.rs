//! The configuration module of the structured-acceptance engine.
use serde::{Deserialize, Serialize};

/// The configuration of the [`Engine`](crate::engine::Engine). This should suffice for most scenarios.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Config {
    /// The configuration of the engine's stepper bookkeeping.
    pub engine_config: EngineConfig,
    /// The configuration of token healing.
    pub healing_config: HealingConfig,
    /// The configuration of `pattern`/`format` validation for schema strings.
    pub regex_config: RegexConfig,
}

/// The configuration of the [`Engine`](crate::engine::Engine) struct itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// Whether steppers that are value-equal after a consume step are merged.
    /// Disabling this is only useful for debugging; the live-stepper set can
    /// grow unboundedly without merging (spec.md §5's "merge minimality"
    /// invariant no longer holds when this is off).
    pub merge_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merge_enabled: true,
        }
    }
}

/// The configuration of token healing (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HealingConfig {
    /// Whether the sampler rewrites oversized sampled tokens into a healed sequence.
    pub enabled: bool,
    /// The maximum number of tokens a single healing chain may be split into.
    /// Bounds the per-step trie walk cost; chains that would need to split
    /// further are treated as non-healable and masked out instead.
    pub max_healing_depth: usize,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_healing_depth: 4,
        }
    }
}

/// The configuration of regular-expression-based `pattern` validation for
/// [`StringSchema`](crate::schema::string_schema::StringSchema).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RegexConfig {
    /// The maximum number of DFA states built while compiling a `pattern`.
    /// Guards against pathological regexes blowing up compile time/memory
    /// (spec.md §9 warns the DFA has worst-case exponential size).
    pub max_dfa_states: usize,
}

impl Default for RegexConfig {
    fn default() -> Self {
        Self {
            max_dfa_states: 1 << 16,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_config: EngineConfig::default(),
            healing_config: HealingConfig::default(),
            regex_config: RegexConfig::default(),
        }
    }
}

/// Delimiters framing structured output within free text, e.g. (` ```json\n `, `\n``` `).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Delimiters {
    /// The opening delimiter.
    pub open: String,
    /// The closing delimiter.
    pub close: String,
}

/// Options recognised by [`Engine::with_config`](crate::engine::Engine::with_config).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EngineOptions {
    /// Wrap the compiled acceptor in an [`Encapsulated`](crate::acceptor::composite::Encapsulated)
    /// acceptor framed by `delimiters`.
    pub delimiters: Option<Delimiters>,
    /// `None`/absent = no scratchpad. `Some(0)` = scratchpad permitted but
    /// structured output may start immediately. `Some(n)` with `n > 0` =
    /// structured output forbidden until `n` buffer characters have been
    /// emitted. Only consulted when `delimiters` is `None`; when delimiters
    /// are set, the scratchpad is governed by the [`WaitFor`](crate::acceptor::composite::WaitFor)
    /// wrapped inside [`Encapsulated`](crate::acceptor::composite::Encapsulated) instead.
    pub buffer_length: Option<i64>,
}
