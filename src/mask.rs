//! Vocabulary masking and token healing (C7): turns a live stepper set into
//! the set of vocabulary token ids that may legally be sampled next, plus a
//! healing table for oversized tokens that overshoot what the acceptors
//! would allow.
use crate::acceptor::{advance_all_basic, Stepper};
use crate::config::HealingConfig;
use crate::utils::get_deterministic_display_form_from_hash_map;
use crate::vocabulary::Vocabulary;
use ahash::AHashMap;
use fixedbitset::FixedBitSet;

/// The result of one mask-construction pass: which token ids are directly
/// allowed, and how to rewrite ("heal") an oversized token that a sampler
/// picked anyway into a sequence of smaller, acceptor-legal tokens.
#[derive(Clone)]
pub struct MaskResult {
    pub allowed: FixedBitSet,
    pub healing: AHashMap<u32, Vec<u32>>,
}

impl std::fmt::Debug for MaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let healing = get_deterministic_display_form_from_hash_map(&self.healing, |(k, v)| {
            (*k, v.clone())
        });
        f.debug_struct("MaskResult")
            .field("allowed", &self.allowed.ones().collect::<Vec<_>>())
            .field("healing", &healing)
            .finish()
    }
}

impl MaskResult {
    pub fn is_allowed(&self, token_id: u32) -> bool {
        self.allowed.contains(token_id as usize)
    }
}

/// Walk the vocabulary trie one character at a time, carrying forward only
/// the stepper set live at each prefix. A prefix that kills every stepper
/// prunes its whole subtree at once: we never re-test its descendants'
/// full token text against the root stepper set the way a flat vocabulary
/// scan would, so cost tracks reachable trie nodes rather than `|V|`. Only
/// when a branch dies and healing is enabled do we fall back to scanning
/// that dead subtree's tokens individually, since healing a token needs its
/// full text decomposed from the root stepper set, not just the suffix
/// past the point where the branch died.
pub fn build_mask(
    steppers: &[Stepper],
    vocab: &Vocabulary,
    healing: &HealingConfig,
) -> MaskResult {
    let mut allowed = FixedBitSet::with_capacity(vocab.vocab_size());
    let mut healing_map = AHashMap::default();

    walk(
        steppers,
        steppers,
        vocab,
        healing,
        &[],
        &mut allowed,
        &mut healing_map,
    );

    MaskResult {
        allowed,
        healing: healing_map,
    }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    root_steppers: &[Stepper],
    live: &[Stepper],
    vocab: &Vocabulary,
    healing: &HealingConfig,
    prefix: &[u8],
    allowed: &mut FixedBitSet,
    healing_map: &mut AHashMap<u32, Vec<u32>>,
) {
    if !prefix.is_empty() {
        if let Some(token_id) = vocab.trie().exact(prefix) {
            allowed.insert(token_id as usize);
        }
    }

    for next_char in next_chars(vocab, prefix) {
        let mut child_prefix = prefix.to_vec();
        let mut buf = [0u8; 4];
        child_prefix.extend_from_slice(next_char.encode_utf8(&mut buf).as_bytes());
        let advanced = advance_all_basic(live, &next_char.to_string());
        if !advanced.is_empty() {
            walk(
                root_steppers,
                &advanced,
                vocab,
                healing,
                &child_prefix,
                allowed,
                healing_map,
            );
        } else if healing.enabled {
            for (bytes, token_id) in vocab.trie().entries_with_prefix(&child_prefix) {
                if allowed.contains(token_id as usize) || healing_map.contains_key(&token_id) {
                    continue;
                }
                let Ok(text) = std::str::from_utf8(bytes) else {
                    continue;
                };
                if let Some(chain) = heal(root_steppers, vocab, text, healing.max_healing_depth) {
                    healing_map.insert(token_id, chain);
                }
            }
        }
    }
}

/// The distinct next characters the trie offers immediately after `prefix`,
/// read off the byte immediately following it in every entry sharing that
/// prefix. `prefix` always ends on a char boundary (it's built by appending
/// whole `char`s), so the bytes right after it always start a new char.
fn next_chars(vocab: &Vocabulary, prefix: &[u8]) -> Vec<char> {
    let mut chars = Vec::new();
    for (bytes, _) in vocab.trie().entries_with_prefix(prefix) {
        let rest = &bytes[prefix.len()..];
        if rest.is_empty() {
            continue;
        }
        let Ok(rest) = std::str::from_utf8(rest) else {
            continue;
        };
        if let Some(ch) = rest.chars().next() {
            if !chars.contains(&ch) {
                chars.push(ch);
            }
        }
    }
    chars
}

/// Rewrite an oversized token into the longest healable prefix chain: the
/// longest proper prefix of `text` that both (a) decomposes exactly into
/// existing vocabulary tokens and (b) stays grammar-alive through every
/// piece. The discarded suffix is not this function's problem — the caller
/// re-feeds it as the start of the next decoding step, same as truncating a
/// token and letting the model resample the remainder.
///
/// Trying the full length first and working down is deliberate: `text`
/// itself already failed the direct acceptance check in [`build_mask`], so
/// starting at `chars.len()` would be wasted work; `chars.len() - 1` is the
/// longest length worth trying.
fn heal(
    steppers: &[Stepper],
    vocab: &Vocabulary,
    text: &str,
    max_depth: usize,
) -> Option<Vec<u32>> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return None;
    }
    for end in (1..chars.len()).rev() {
        if let Some(chain) = decompose(steppers, &chars[..end], vocab, max_depth) {
            return Some(chain);
        }
    }
    None
}

/// Find a chain of existing vocabulary tokens whose concatenation is
/// exactly `chars`, each accepted in turn by the acceptors. Prefers the
/// longest first token at each step, so ties resolve toward fewer, larger
/// pieces.
fn decompose(
    steppers: &[Stepper],
    chars: &[char],
    vocab: &Vocabulary,
    max_depth: usize,
) -> Option<Vec<u32>> {
    if chars.is_empty() {
        return Some(vec![]);
    }
    if max_depth == 0 {
        return None;
    }
    for split in (1..=chars.len()).rev() {
        let candidate: String = chars[..split].iter().collect();
        let Some(id) = vocab.trie().exact(candidate.as_bytes()) else {
            continue;
        };
        let advanced = advance_all_basic(steppers, &candidate);
        if advanced.is_empty() {
            continue;
        }
        if split == chars.len() {
            return Some(vec![id]);
        }
        if let Some(mut rest) = decompose(&advanced, &chars[split..], vocab, max_depth - 1) {
            let mut chain = vec![id];
            chain.append(&mut rest);
            return Some(chain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::primitive::Phrase;
    use crate::acceptor::Acceptor;
    use crate::vocabulary::{CreateVocabularyError, Token};
    use ahash::AHashMap as Map;
    use std::sync::Arc;

    fn vocab(pairs: &[(u32, &str)]) -> Result<Vocabulary, CreateVocabularyError> {
        let mut id_to_token = Map::default();
        let mut id_to_token_string = Map::default();
        for &(id, s) in pairs {
            id_to_token.insert(id, Token::from_str(s));
            id_to_token_string.insert(id, s.to_string());
        }
        Vocabulary::new(id_to_token, id_to_token_string)
    }

    #[test]
    fn mask_allows_only_matching_tokens() {
        let v = vocab(&[(1, "hel"), (2, "bye"), (3, "hello")]).unwrap();
        let acceptor = Arc::new(Acceptor::Phrase(Phrase::new("hello")));
        let steppers = acceptor.initial_steppers();
        let mask = build_mask(&steppers, &v, &HealingConfig::default());
        assert!(mask.is_allowed(1));
        assert!(mask.is_allowed(3));
        assert!(!mask.is_allowed(2));
    }

    #[test]
    fn heals_oversized_token_into_legal_chain() {
        let v = vocab(&[(1, "re"), (2, "d"), (3, "reduce")]).unwrap();
        let acceptor = Arc::new(Acceptor::Phrase(Phrase::new("red")));
        let steppers = acceptor.initial_steppers();
        let mask = build_mask(&steppers, &v, &HealingConfig::default());
        assert!(!mask.is_allowed(3));
        assert_eq!(mask.healing.get(&3), Some(&vec![1, 2]));
    }
}
