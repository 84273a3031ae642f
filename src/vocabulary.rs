//! This module contains the [`Vocabulary`] struct, which represents a language model's tokenizer
//! vocabulary, and the [`VocabularyTrie`] used to walk it during mask construction.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A wrapper struct that represents a token in bytes in a language model's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Token(pub Box<[u8]>);

impl Token {
    /// Construct a token from a UTF-8 string.
    pub fn from_str(s: &str) -> Self {
        Token(s.as_bytes().to_vec().into_boxed_slice())
    }
}

#[derive(Debug, thiserror::Error)]
/// The error type for [`Vocabulary`] creation.
pub enum CreateVocabularyError {
    /// The vocabulary size exceeds the maximum supported size.
    #[error("The vocabulary size is {0}, while the maximum supported is {1}.")]
    VocabularyTooLarge(usize, usize),
}

/// The struct represents a language model's vocabulary: the id<->string mapping
/// supplied by the tokenizer, plus a byte-trie over the decoded strings used
/// by the mask/healing layer to walk candidate extensions efficiently.
#[derive(Clone)]
pub struct Vocabulary {
    pub(crate) id_to_token: AHashMap<u32, Token>,
    pub(crate) id_to_token_string: AHashMap<u32, String>,
    pub(crate) token_to_id: AHashMap<Token, u32>,
    pub(crate) trie: VocabularyTrie,
}

impl Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}

impl Vocabulary {
    /// Creates a new instance of [`Vocabulary`].
    ///
    /// # Arguments
    ///
    /// * `id_to_token` - A map from token IDs to tokens in bytes.
    /// * `id_to_token_string` - A map from token IDs to tokens in UTF-8 string form.
    ///   This is kept separate from `id_to_token` because a token's bytes may not
    ///   be valid UTF-8 on their own (e.g. a token straddling a multi-byte
    ///   codepoint), while the decoded string form is what the engine reasons
    ///   about when matching acceptors.
    pub fn new(
        id_to_token: AHashMap<u32, Token>,
        id_to_token_string: AHashMap<u32, String>,
    ) -> Result<Vocabulary, CreateVocabularyError> {
        if id_to_token.len() >= 0x1000000 {
            return Err(CreateVocabularyError::VocabularyTooLarge(
                id_to_token.len(),
                0x1000000,
            ));
        }
        let mut token_to_id = AHashMap::with_capacity(id_to_token.len());
        for (&id, token) in id_to_token.iter() {
            if let Some(prev) = token_to_id.insert(token.clone(), id) {
                log::warn!(
                    "Token IDs {prev} and {id} map to the same token bytes; \
                     only the first will be reachable via token_id()."
                );
            }
        }
        let mut trie = BTreeMap::new();
        for (&id, s) in id_to_token_string.iter() {
            if s.is_empty() {
                log::warn!("Token ID {id} corresponds to an empty string and will be ignored.");
                continue;
            }
            trie.insert(s.as_bytes().to_vec().into_boxed_slice(), id);
        }
        Ok(Self {
            id_to_token,
            id_to_token_string,
            token_to_id,
            trie: VocabularyTrie { by_bytes: trie },
        })
    }

    /// Retrieves the token bytes associated with the given token ID.
    pub fn token(&self, token_id: u32) -> Option<&Token> {
        self.id_to_token.get(&token_id)
    }

    /// Retrieves the decoded string associated with the given token ID.
    pub fn token_string(&self, token_id: u32) -> Option<&str> {
        self.id_to_token_string.get(&token_id).map(|x| x.as_str())
    }

    /// Retrieves the token ID associated with the given token bytes, if any.
    pub fn token_id(&self, token: &Token) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// The size of the vocabulary, i.e. one past the largest token ID.
    pub fn vocab_size(&self) -> usize {
        self.id_to_token
            .keys()
            .copied()
            .max()
            .map(|x| x + 1)
            .unwrap_or(0) as usize
    }

    /// The trie over decoded token strings, used by [`crate::mask`] to walk
    /// candidate extensions during mask construction.
    pub fn trie(&self) -> &VocabularyTrie {
        &self.trie
    }
}

/// A trie over the vocabulary's decoded token strings, keyed by byte prefix.
///
/// Implemented as a sorted map rather than a pointer-linked node graph: the
/// lexicographic ordering of `BTreeMap<Box<[u8]>, u32>` means every string
/// sharing a given byte prefix lives in one contiguous `range()`, which gives
/// us trie-style prefix enumeration without arena or node bookkeeping.
#[derive(Clone)]
pub struct VocabularyTrie {
    by_bytes: BTreeMap<Box<[u8]>, u32>,
}

impl VocabularyTrie {
    /// Enumerate `(token_string_bytes, token_id)` pairs whose bytes begin with `prefix`.
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], u32)> + 'a {
        let mut upper = prefix.to_vec();
        // Smallest byte string that is lexicographically greater than every
        // string starting with `prefix`: bump the last byte, dropping trailing 0xFFs.
        while let Some(&last) = upper.last() {
            if last == 0xFF {
                upper.pop();
            } else {
                let n = upper.len();
                upper[n - 1] += 1;
                break;
            }
        }
        let range = if upper.is_empty() {
            self.by_bytes.range(prefix.to_vec().into_boxed_slice()..)
        } else {
            self.by_bytes
                .range(prefix.to_vec().into_boxed_slice()..upper.into_boxed_slice())
        };
        range.map(|(bytes, &id)| (bytes.as_ref(), id))
    }

    /// Look up the token id for an exact byte string, if present.
    pub fn exact(&self, bytes: &[u8]) -> Option<u32> {
        self.by_bytes.get(bytes).copied()
    }

    /// Total number of distinct (non-empty) token strings in the trie.
    pub fn len(&self) -> usize {
        self.by_bytes.len()
    }

    /// True if the trie holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.by_bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(pairs: &[(u32, &str)]) -> Vocabulary {
        let mut id_to_token = AHashMap::default();
        let mut id_to_token_string = AHashMap::default();
        for &(id, s) in pairs {
            id_to_token.insert(id, Token::from_str(s));
            id_to_token_string.insert(id, s.to_string());
        }
        Vocabulary::new(id_to_token, id_to_token_string).unwrap()
    }

    #[test]
    fn trie_prefix_lookup() {
        let v = vocab(&[(1, "\"re"), (2, "red"), (3, "\"red\""), (4, "green")]);
        let mut ids: Vec<_> = v
            .trie()
            .entries_with_prefix(b"\"r")
            .map(|(_, id)| id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn empty_tokens_are_ignored() {
        let v = vocab(&[(1, ""), (2, "a")]);
        assert_eq!(v.trie().len(), 1);
    }

    #[test]
    fn prefix_bump_handles_trailing_0xff() {
        let mut id_to_token = AHashMap::default();
        let mut id_to_token_string = AHashMap::default();
        id_to_token.insert(1u32, Token(vec![0xFFu8, 0xFF].into_boxed_slice()));
        id_to_token_string.insert(1u32, "x".to_string());
        let v = Vocabulary::new(id_to_token, id_to_token_string).unwrap();
        assert_eq!(v.trie().entries_with_prefix(&[0xFF]).count(), 1);
    }
}
