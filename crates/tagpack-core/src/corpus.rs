//! Column-format corpus loading.
//!
//! One token per line, the token in the first whitespace-separated column and
//! its tags in the remaining columns. Sentences are separated by blank lines.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{Result, TagpackError};
use crate::format::{open_input, write_file};

/// Document separator line used by CoNLL-style files.
const DOCSTART: &str = "-DOCSTART-";

/// A single sentence: its tokens and the tag columns of each token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<String>,
    pub tags: Vec<Vec<String>>,
}

impl Sentence {
    pub fn new(tokens: Vec<String>, tags: Vec<Vec<String>>) -> Self {
        Self { tokens, tags }
    }

    /// Build a sentence from bare tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let tags = vec![Vec::new(); tokens.len()];
        Self { tokens, tags }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The two corpus partitions the vocabulary is built from.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub dev: Vec<Sentence>,
    pub test: Vec<Sentence>,
}

impl Corpus {
    /// Load the development and test partitions from column files.
    pub fn load(dev: impl AsRef<Path>, test: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            dev: load_column_corpus(dev)?,
            test: load_column_corpus(test)?,
        })
    }

    /// Sentences of both partitions, development first.
    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.dev.iter().chain(self.test.iter())
    }
}

/// Load sentences from a column-format file.
pub fn load_column_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<Sentence>> {
    let path = path.as_ref();
    let reader = open_input(path, "open corpus")?;

    let mut sentences = Vec::new();
    let mut current = Sentence::default();

    for line in reader.lines() {
        let line = line.map_err(|e| TagpackError::io("read corpus", path, e))?;
        let mut columns = line.split_whitespace();

        let Some(token) = columns.next() else {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        };

        if token == DOCSTART {
            continue;
        }

        current.tokens.push(token.to_string());
        current.tags.push(columns.map(str::to_string).collect());
    }

    // Don't forget the last sentence
    if !current.is_empty() {
        sentences.push(current);
    }

    tracing::debug!(path = %path.display(), sentences = sentences.len(), "loaded corpus");
    Ok(sentences)
}

/// Copy a column-format file keeping only the token column.
///
/// Blank lines are preserved so sentence boundaries survive.
pub fn extract_text(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<usize> {
    let input = input.as_ref();
    let output = output.as_ref();
    let reader = open_input(input, "open column file")?;

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| TagpackError::io("read column file", input, e))?;
        lines.push(line.split_whitespace().next().unwrap_or("").to_string());
    }

    write_file(output, "write text file", |w| {
        for line in &lines {
            writeln!(w, "{}", line)?;
        }
        Ok(())
    })?;

    Ok(lines.iter().filter(|l| !l.is_empty()).count())
}
