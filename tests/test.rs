//! Integration tests over the public `EngineLike` surface, one per
//! concrete scenario.
use ahash::AHashMap;
use serde_json::json;
use std::sync::{Arc, Mutex};
use structa::config::{Config, Delimiters, EngineOptions};
use structa::{Engine, EngineLike, Grammar, GrammarVerdict, StepperValue, Token, Vocabulary};

fn char_vocab(alphabet: &[&str]) -> Arc<Vocabulary> {
    let mut id_to_token = AHashMap::default();
    let mut id_to_token_string = AHashMap::default();
    for (i, s) in alphabet.iter().enumerate() {
        id_to_token.insert(i as u32, Token::from_str(s));
        id_to_token_string.insert(i as u32, s.to_string());
    }
    Arc::new(Vocabulary::new(id_to_token, id_to_token_string).unwrap())
}

fn feed_chars(engine: &mut Engine, vocab: &Vocabulary, text: &str) {
    for ch in text.chars() {
        let s = ch.to_string();
        let id = vocab.token_id(&Token::from_str(&s)).unwrap();
        engine.try_accept_new_token(id).unwrap();
    }
}

#[test]
fn s1_simple_json() {
    let vocab = char_vocab(&[
        "{", "}", "\"", ":", ",", " ", "v", "a", "l", "u", "e", "9", ".", "1",
    ]);
    let schema = json!({
        "type": "object",
        "properties": {"value": {"type": "number"}},
        "required": ["value"]
    });
    let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
    feed_chars(&mut engine, &vocab, r#"{"value": 9.11}"#);
    assert!(engine.is_finished());
    let value = engine.output().into_json().unwrap();
    assert_eq!(value, json!({"value": 9.11}));
}

#[test]
fn s4_recursive_ref_schema_with_max_items() {
    let vocab = char_vocab(&[
        "{", "}", "[", "]", "\"", ":", ",", "t", "y", "p", "e", "d", "i", "v", "b", "u", "n", "o",
        "l", "a", "k", "C", "h", "c", "r", "e", "s", "\n",
    ]);
    let schema = json!({
        "type": "object",
        "properties": {
            "type": {"type": "string"},
            "label": {"type": "string"},
            "children": {
                "type": "array",
                "items": {"$ref": "#"},
                "maxItems": 1
            }
        },
        "required": ["type"]
    });
    let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
    let nested = r#"{"type":"div","children":[{"type":"button","label":"Click"}]}"#;
    feed_chars(&mut engine, &vocab, nested);
    assert!(engine.is_finished());
}

#[test]
fn s6_numeric_bounds_deferred_validation() {
    let vocab = char_vocab(&["1", "2", "5"]);
    let schema = json!({"type": "number", "minimum": 10, "maximum": 20});
    let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
    feed_chars(&mut engine, &vocab, "15");
    assert!(engine.has_reached_accept_state());

    let mut rejected = Engine::new(vocab.clone(), &schema).unwrap();
    feed_chars(&mut rejected, &vocab, "2");
    let ok = rejected.try_accept_new_token(vocab.token_id(&Token::from_str("5")).unwrap());
    assert!(ok.is_ok());
    assert!(!rejected.has_reached_accept_state());
}

#[test]
fn s5_python_grammar_block_via_delimiters() {
    let vocab = char_vocab(&[
        "p", "r", "i", "n", "t", "(", ")", "'", "h", "d", "e", "f", " ", "\n",
    ]);
    let validator: Arc<dyn Fn(&str, bool) -> GrammarVerdict + Send + Sync> =
        Arc::new(|s: &str, strict: bool| {
            if s.contains("def def") {
                return GrammarVerdict::Reject;
            }
            if !strict {
                return GrammarVerdict::MaybeAccept;
            }
            if s.ends_with(')') && s.matches('(').count() == s.matches(')').count() {
                GrammarVerdict::Accept
            } else {
                GrammarVerdict::MaybeAccept
            }
        });
    let grammar = Grammar::new("python", validator);
    let config = Config::default();
    let options = EngineOptions {
        delimiters: Some(Delimiters {
            open: "```python\n".to_string(),
            close: "\n```".to_string(),
        }),
        buffer_length: None,
    };
    let mut engine = Engine::with_grammar(vocab.clone(), grammar, config, options);
    feed_chars(&mut engine, &vocab, "```python\nprint('hi')\n```");
    assert!(engine.has_reached_accept_state());
}

#[test]
fn s2_fenced_json_with_leading_scratchpad() {
    let vocab = char_vocab(&[
        "h", "i", "\n", "`", "j", "s", "o", "n", "{", "}", "\"", "a", ":", "1",
    ]);
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}},
        "required": ["a"]
    });
    let options = EngineOptions {
        delimiters: Some(Delimiters {
            open: "```json\n".to_string(),
            close: "\n```".to_string(),
        }),
        buffer_length: Some(0),
    };
    let mut engine =
        Engine::with_config(vocab.clone(), &schema, Config::default(), options).unwrap();
    feed_chars(&mut engine, &vocab, "hi\n```json\n{\"a\":1}\n```");
    assert!(engine.is_finished());
    assert_eq!(engine.output().into_json().unwrap(), json!({"a": 1}));
}

#[test]
fn s3_enum_schema_token_healing_unmasking() {
    let vocab = char_vocab(&[
        "\"re", "red", "\"red\"", "\"red\"X", "\"green\"", "\"blue\"",
    ]);
    let schema = json!({"type": "string", "enum": ["red", "green", "blue"]});
    let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
    engine.update_logits().unwrap();
    let mask = engine.allowed_token_ids_from_last_computation().unwrap();
    let id = |s: &str| vocab.token_id(&Token::from_str(s)).unwrap();

    assert!(mask.is_allowed(id("\"re")));
    assert!(!mask.is_allowed(id("red")));
    assert!(mask.is_allowed(id("\"red\"")));
    assert!(mask.is_allowed(id("\"green\"")));
    assert!(mask.is_allowed(id("\"blue\"")));
    assert!(!mask.is_allowed(id("\"red\"X")));
    assert_eq!(
        mask.healing.get(&id("\"red\"X")),
        Some(&vec![id("\"red\"")])
    );
}

fn paren_whitespace_validator() -> Arc<dyn Fn(&str, bool) -> GrammarVerdict + Send + Sync> {
    Arc::new(|s: &str, strict: bool| {
        let mut chars = s.chars();
        match chars.next() {
            None => return GrammarVerdict::MaybeAccept,
            Some('(') => {}
            _ => return GrammarVerdict::Reject,
        }
        let rest = chars.as_str();
        let trimmed = rest.trim_start_matches(char::is_whitespace);
        if trimmed.is_empty() {
            return GrammarVerdict::MaybeAccept;
        }
        if trimmed == ")" && strict {
            GrammarVerdict::Accept
        } else if trimmed == ")" {
            GrammarVerdict::MaybeAccept
        } else {
            GrammarVerdict::Reject
        }
    })
}

#[test]
fn s7_oversized_token_healing_rewrite() {
    let vocab = char_vocab(&["(", ")", " ", "(."]);
    let grammar = Grammar::new("paren_ws", paren_whitespace_validator());
    let mut engine = Engine::with_grammar(
        vocab.clone(),
        grammar,
        Config::default(),
        EngineOptions::default(),
    );
    engine.update_logits().unwrap();
    let mask = engine.allowed_token_ids_from_last_computation().unwrap();
    let id = |s: &str| vocab.token_id(&Token::from_str(s)).unwrap();

    assert!(mask.is_allowed(id("(")));
    assert!(!mask.is_allowed(id(")")));
    assert!(!mask.is_allowed(id(" ")));
    assert!(!mask.is_allowed(id("(.")));
    assert_eq!(mask.healing.get(&id("(.")), Some(&vec![id("(")]));
}

#[test]
fn reused_engine_resets_between_generations() {
    let vocab = char_vocab(&["{", "}", "\"", "a", ":"]);
    let schema = json!({"type": "object", "properties": {}});
    let mut engine = Engine::new(vocab.clone(), &schema).unwrap();
    feed_chars(&mut engine, &vocab, "{}");
    assert!(engine.is_finished());
    engine.reset();
    assert_eq!(engine.output(), StepperValue::None);
    assert!(!engine.is_finished());
}

#[test]
fn grammar_validator_closure_can_observe_call_count() {
    let calls = Arc::new(Mutex::new(0usize));
    let calls_clone = calls.clone();
    let validator: Arc<dyn Fn(&str, bool) -> GrammarVerdict + Send + Sync> =
        Arc::new(move |s: &str, strict: bool| {
            *calls_clone.lock().unwrap() += 1;
            if s == "ok" {
                if strict {
                    GrammarVerdict::Accept
                } else {
                    GrammarVerdict::MaybeAccept
                }
            } else if "ok".starts_with(s) {
                GrammarVerdict::MaybeAccept
            } else {
                GrammarVerdict::Reject
            }
        });
    let grammar = Grammar::new("probe", validator);
    let vocab = char_vocab(&["o", "k"]);
    let mut engine = Engine::with_grammar(
        vocab.clone(),
        grammar,
        Config::default(),
        EngineOptions::default(),
    );
    feed_chars(&mut engine, &vocab, "ok");
    assert!(engine.has_reached_accept_state());
    assert!(*calls.lock().unwrap() >= 2);
}
