//! # Fallback Resolution
//!
//! Maps corpus tokens onto the keys of an embedding store. Every token is tried
//! against four forms in strict order and the first form present in the store
//! wins:
//!
//! 1. the token itself
//! 2. its lower-cased form
//! 3. the lower-cased form with every decimal digit replaced by `#`
//! 4. the lower-cased form with every decimal digit replaced by `0`
//!
//! Tokens matching none of them are dropped. Each resolved token takes the next
//! id (from 1); for tiers 2 to 4 the matched form is registered under the same
//! id as the token.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::embedding::store::EmbeddingStore;
use crate::error::Result;
use crate::vocab::Vocabulary;

/// Which fallback form matched a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionTier {
    Exact,
    Lowercase,
    DigitHash,
    DigitZero,
}

impl ResolutionTier {
    /// Total number of tiers.
    pub const NUM_TIERS: usize = 4;

    /// All tiers in the order they are tried.
    pub fn all() -> &'static [ResolutionTier] {
        &[
            ResolutionTier::Exact,
            ResolutionTier::Lowercase,
            ResolutionTier::DigitHash,
            ResolutionTier::DigitZero,
        ]
    }

    pub fn index(&self) -> usize {
        match self {
            ResolutionTier::Exact => 0,
            ResolutionTier::Lowercase => 1,
            ResolutionTier::DigitHash => 2,
            ResolutionTier::DigitZero => 3,
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionTier::Exact => write!(f, "exact"),
            ResolutionTier::Lowercase => write!(f, "lowercase"),
            ResolutionTier::DigitHash => write!(f, "digit-hash"),
            ResolutionTier::DigitZero => write!(f, "digit-zero"),
        }
    }
}

/// Produces the fallback forms of a token.
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    digit: Regex,
}

impl TokenNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            digit: Regex::new(r"\d")?,
        })
    }

    /// Replace every decimal digit with `replacement`.
    pub fn replace_digits(&self, text: &str, replacement: &str) -> String {
        self.digit.replace_all(text, replacement).into_owned()
    }

    /// The form of `token` tried at `tier`.
    pub fn form(&self, token: &str, tier: ResolutionTier) -> String {
        match tier {
            ResolutionTier::Exact => token.to_string(),
            ResolutionTier::Lowercase => token.to_lowercase(),
            ResolutionTier::DigitHash => self.replace_digits(&token.to_lowercase(), "#"),
            ResolutionTier::DigitZero => self.replace_digits(&token.to_lowercase(), "0"),
        }
    }

    /// Find the first form of `token` present in `store`.
    pub fn resolve(
        &self,
        token: &str,
        store: &dyn EmbeddingStore,
    ) -> Option<(ResolutionTier, String)> {
        ResolutionTier::all().iter().find_map(|&tier| {
            let form = self.form(token, tier);
            store.contains(&form).then_some((tier, form))
        })
    }
}

/// The outcome of resolving a vocabulary against one store.
///
/// Holds both halves of an embedding export: the registered strings with their
/// ids, and the store key backing each id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVocabulary {
    entries: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
    rows: Vec<String>,
    tier_counts: [usize; ResolutionTier::NUM_TIERS],
    dropped: usize,
}

impl ResolvedVocabulary {
    /// Resolve every vocabulary token in id order.
    pub fn resolve(vocab: &Vocabulary, store: &dyn EmbeddingStore) -> Result<Self> {
        let normalizer = TokenNormalizer::new()?;
        Ok(Self::resolve_tokens(
            vocab.tokens().iter().map(String::as_str),
            store,
            &normalizer,
        ))
    }

    /// Resolve tokens in the given order.
    pub fn resolve_tokens<'a, I>(
        tokens: I,
        store: &dyn EmbeddingStore,
        normalizer: &TokenNormalizer,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = Self::default();

        for token in tokens {
            let Some((tier, form)) = normalizer.resolve(token, store) else {
                resolved.dropped += 1;
                continue;
            };

            let id = resolved.next_id();
            resolved.register(token, id);
            if tier != ResolutionTier::Exact {
                resolved.register(&form, id);
            }
            resolved.rows.push(form);
            resolved.tier_counts[tier.index()] += 1;
        }

        resolved
    }

    /// Insert-or-update: a string registered again keeps its position and
    /// takes the newer id.
    fn register(&mut self, key: &str, id: u64) {
        match self.positions.get(key) {
            Some(&pos) => self.entries[pos].1 = id,
            None => {
                self.positions.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), id));
            }
        }
    }

    /// The id the next resolved token would take; equals the table row count
    /// including the padding row.
    pub fn next_id(&self) -> u64 {
        self.rows.len() as u64 + 1
    }

    /// Registered strings and their ids, in registration order.
    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    /// Id registered for `key`.
    pub fn id(&self, key: &str) -> Option<u64> {
        self.positions.get(key).map(|&pos| self.entries[pos].1)
    }

    /// Store keys backing ids `1..next_id`, in id order.
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Number of tokens resolved at `tier`.
    pub fn tier_count(&self, tier: ResolutionTier) -> usize {
        self.tier_counts[tier.index()]
    }

    /// Number of resolved tokens.
    pub fn resolved(&self) -> usize {
        self.rows.len()
    }

    /// Number of tokens no form of which was found.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
