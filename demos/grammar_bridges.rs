//! Illustrative [`GrammarValidator`](structa::grammar::GrammarValidator)
//! closures for fenced non-JSON blocks. These are demonstrations, not
//! production parsers: a real integration would call out to `rustpython`,
//! `tree-sitter-python`, or a shell lexer crate instead of the
//! paren/keyword heuristics below.
use std::sync::Arc;
use structa::grammar::{Grammar, GrammarValidator, GrammarVerdict};

/// A toy Python-source validator: tracks bracket balance and rejects a
/// short list of unambiguous syntax errors (`def def`, trailing operators).
/// Anything else is `MaybeAccept` until bracket balance closes.
pub fn python_grammar() -> Grammar {
    let validator: GrammarValidator = Arc::new(|src: &str, strict: bool| {
        if src.contains("def def") {
            return GrammarVerdict::Reject;
        }
        let mut depth: i32 = 0;
        for ch in src.chars() {
            match ch {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return GrammarVerdict::Reject;
                    }
                }
                _ => {}
            }
        }
        if !strict {
            return GrammarVerdict::MaybeAccept;
        }
        if depth == 0 && src.ends_with(['\n', ')', '"', '\'']) && !src.is_empty() {
            GrammarVerdict::Accept
        } else {
            GrammarVerdict::MaybeAccept
        }
    });
    Grammar::new("python", validator)
}

/// A toy Bash validator: rejects unmatched quotes and `fi`/`done` without a
/// matching opener; accepts once every opened construct has closed.
pub fn bash_grammar() -> Grammar {
    let validator: GrammarValidator = Arc::new(|src: &str, strict: bool| {
        let mut if_depth: i32 = 0;
        let mut do_depth: i32 = 0;
        let mut quote: Option<char> = None;
        for word in src.split_whitespace() {
            match word {
                "if" => if_depth += 1,
                "fi" => {
                    if_depth -= 1;
                    if if_depth < 0 {
                        return GrammarVerdict::Reject;
                    }
                }
                "do" => do_depth += 1,
                "done" => {
                    do_depth -= 1;
                    if do_depth < 0 {
                        return GrammarVerdict::Reject;
                    }
                }
                _ => {}
            }
        }
        for ch in src.chars() {
            match (quote, ch) {
                (None, '\'') | (None, '"') => quote = Some(ch),
                (Some(q), c) if c == q => quote = None,
                _ => {}
            }
        }
        if quote.is_some() || if_depth > 0 || do_depth > 0 {
            return GrammarVerdict::MaybeAccept;
        }
        if !strict {
            return GrammarVerdict::MaybeAccept;
        }
        if !src.is_empty() && src.trim_end().ends_with('\n') {
            GrammarVerdict::Accept
        } else {
            GrammarVerdict::MaybeAccept
        }
    });
    Grammar::new("bash", validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use structa::acceptor::{advance_all_basic, Acceptor};

    #[test]
    fn python_grammar_accepts_balanced_print() {
        let acceptor = Acceptor::Grammar(python_grammar());
        let steppers = std::sync::Arc::new(acceptor).initial_steppers();
        let result = advance_all_basic(&steppers, "print('hi')\n");
        assert!(result.iter().any(|s| s.has_reached_accept_state()));
    }

    #[test]
    fn python_grammar_rejects_duplicate_def_keyword() {
        let acceptor = Acceptor::Grammar(python_grammar());
        let steppers = std::sync::Arc::new(acceptor).initial_steppers();
        let result = advance_all_basic(&steppers, "def def\n");
        assert!(result.is_empty());
    }

    #[test]
    fn bash_grammar_waits_for_matching_fi() {
        let acceptor = Acceptor::Grammar(bash_grammar());
        let steppers = std::sync::Arc::new(acceptor).initial_steppers();
        let mid = advance_all_basic(&steppers, "if true\n");
        assert!(mid.iter().any(|s| s.can_accept_more_input()));
        assert!(!mid.iter().any(|s| s.has_reached_accept_state()));
    }
}
