/*!
# structa

This crate provides a constrained-decoding engine that masks and heals a
language model's sampled tokens against a JSON Schema, a fenced grammar
block, or a caller-supplied external grammar validator, so the emitted
token stream is always a valid prefix of the target structure.

```rust
use ahash::AHashMap;
use structa::{Engine, EngineLike, Token, Vocabulary};

let mut token_strings: AHashMap<u32, String> = AHashMap::default();
for (id, s) in [(0u32, "{"), (1, "}"), (2, "\"a\""), (3, ": "), (4, "1")] {
    token_strings.insert(id, s.to_string());
}
let tokens = token_strings
    .iter()
    .map(|(k, v)| (*k, Token::from_str(v)))
    .collect::<AHashMap<u32, _>>();
let vocab = std::sync::Arc::new(Vocabulary::new(tokens, token_strings).unwrap());

let schema = serde_json::json!({
    "type": "object",
    "properties": {"a": {"type": "integer"}},
    "required": ["a"]
});
let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
engine.try_accept_new_token(0).unwrap(); // "{"
engine.try_accept_new_token(2).unwrap(); // "\"a\""
engine.try_accept_new_token(3).unwrap(); // ": "
engine.try_accept_new_token(4).unwrap(); // "1"
engine.try_accept_new_token(1).unwrap(); // "}"
assert!(engine.is_finished());
```

# Overview

The primary types are [`EngineLike`] and [`Engine`]. [`EngineLike`] defines
the operations a decoding loop drives an engine through; [`Engine`] is the
concrete implementation built from a JSON Schema (or an external
[`Grammar`]) and a [`Vocabulary`]. The most important methods are:

- [`Engine::new`] / [`Engine::with_config`]: compile a JSON Schema into an
  acceptor tree and build an engine around it and a vocabulary.
- [`EngineLike::try_accept_new_token`]: feed one sampled token id, advancing
  every live parse branch.
- [`EngineLike::update_logits`] / [`EngineLike::mask_logits`]: recompute and
  apply the per-step vocabulary mask.
- [`EngineLike::reset`]: rewind to the configured initial stepper set, so one
  compiled engine can be reused across many generations.

# Module map

- [`acceptor`]: the primitive and composite state-machine building blocks
  (`Phrase`, `Character`, `Chain`, `Loop`, `WaitFor`, `Encapsulated`, the JSON
  grammar primitives) and the `Acceptor`/`Stepper` sum types that drive them.
- [`schema`]: compiles a `serde_json::Value` JSON Schema document into an
  `Acceptor` tree, handling `$ref`, `allOf`/`anyOf`/`oneOf`, `enum`/`const`,
  and per-type constraints.
- [`grammar`]: the external-grammar bridge for fenced blocks this crate
  doesn't model directly (e.g. Python, Bash).
- [`mask`]: walks the vocabulary trie against the live stepper set to build
  the per-step allow-mask and the token-healing table.
- [`vocabulary`]: the tokenizer vocabulary and its byte-trie.
- [`config`]: engine/healing/regex configuration, with `serde` (de)serialization.
- [`engine`] / [`engine_like`]: the engine façade and its sealed trait contract.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![allow(rustdoc::private_intra_doc_links)]

pub mod acceptor;
pub mod config;
pub mod engine;
pub mod engine_like;
pub mod grammar;
pub mod mask;
pub mod schema;
mod utils;
pub mod value;
pub mod vocabulary;

pub use config::Config;
pub use engine::{CreateEngineError, Engine};
pub use engine_like::{AcceptTokenError, AcceptTokenResult, EngineLike};
pub use grammar::{Grammar, GrammarValidator, GrammarVerdict};
pub use mask::MaskResult;
pub use value::StepperValue;
pub use vocabulary::{CreateVocabularyError, Token, Vocabulary};
