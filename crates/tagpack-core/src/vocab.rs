//! # Text Vocabularies
//!
//! Token vocabularies built from the corpus, and the tab-separated text form
//! shared by every `.vocab` file:
//!
//! ```text
//! <count>
//! <token>\t<id>
//! ...
//! ```
//!
//! Ids are assigned densely from 1 in first-seen order (development partition
//! first, then test). Id 0 is reserved for padding and never assigned to a
//! corpus token.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::corpus::{Corpus, Sentence};
use crate::error::{Result, TagpackError};
use crate::format::{open_input, write_file};

/// Padding token written as the first entry of embedding vocabularies.
pub const PAD_TOKEN: &str = "<PAD>";

/// Id reserved for padding and unknown tokens.
pub const PAD_ID: u64 = 0;

/// Deduplicated corpus tokens with dense ids starting at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u64>,
}

impl Vocabulary {
    /// Create an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the vocabulary of a corpus, development partition first.
    pub fn build(corpus: &Corpus) -> Self {
        Self::from_sentences(corpus.sentences())
    }

    /// Build a vocabulary from sentences in iteration order.
    pub fn from_sentences<'a, I>(sentences: I) -> Self
    where
        I: IntoIterator<Item = &'a Sentence>,
    {
        let mut vocab = Self::new();
        for sentence in sentences {
            for token in &sentence.tokens {
                vocab.insert(token);
            }
        }
        vocab
    }

    /// Add a token, returning its id. Known tokens keep their id.
    pub fn insert(&mut self, token: &str) -> u64 {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        self.tokens.push(token.to_string());
        let id = self.tokens.len() as u64;
        self.ids.insert(token.to_string(), id);
        id
    }

    /// Id of a token, if present.
    pub fn id(&self, token: &str) -> Option<u64> {
        self.ids.get(token).copied()
    }

    /// Tokens in id order (the token at index `i` has id `i + 1`).
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// `(token, id)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i as u64 + 1))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Write the text form.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", self.len())?;
        for (token, id) in self.iter() {
            writeln!(writer, "{}\t{}", token, id)?;
        }
        Ok(())
    }

    /// Write the text form to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_file(path, "write vocabulary", |w| self.write(w))?;
        tracing::info!(path = %path.display(), tokens = self.len(), "wrote vocabulary");
        Ok(())
    }
}

/// A vocabulary file read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabFile {
    /// The count on the first line.
    pub declared: usize,
    /// Entries in file order, including a `<PAD>` entry if present.
    pub entries: Vec<(String, u64)>,
}

impl VocabFile {
    /// Parse the text form.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(line) => line.map_err(|e| TagpackError::Format(e.to_string()))?,
            None => return Err(TagpackError::Format("empty vocabulary file".into())),
        };
        let declared = header.trim().parse::<usize>().map_err(|_| {
            TagpackError::Format(format!("invalid vocabulary count line: {:?}", header))
        })?;

        let mut entries = Vec::with_capacity(declared + 1);
        for (lineno, line) in lines.enumerate() {
            let line = line.map_err(|e| TagpackError::Format(e.to_string()))?;
            if line.is_empty() {
                continue;
            }
            let (token, id) = line.rsplit_once('\t').ok_or_else(|| {
                TagpackError::Format(format!("line {}: missing tab separator", lineno + 2))
            })?;
            let id = id.parse::<u64>().map_err(|_| {
                TagpackError::Format(format!("line {}: invalid id {:?}", lineno + 2, id))
            })?;
            entries.push((token.to_string(), id));
        }

        Ok(Self { declared, entries })
    }

    /// Read a vocabulary file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(open_input(path, "open vocabulary")?)
    }

    /// Token to id lookup table. Later entries win on duplicates.
    pub fn to_map(&self) -> HashMap<String, u64> {
        self.entries.iter().cloned().collect()
    }

    /// Id of a token, if present.
    pub fn id(&self, token: &str) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|(t, _)| t == token)
            .map(|(_, id)| *id)
    }
}
