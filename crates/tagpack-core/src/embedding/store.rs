//! Word-vector stores keyed by normalized tokens.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, TagpackError};
use crate::format::open_input;

/// A read-only map from a normalized token to a fixed-size vector.
pub trait EmbeddingStore {
    /// Dimensionality of every stored vector.
    fn dim(&self) -> usize;

    /// The vector stored under `key`.
    fn get(&self, key: &str) -> Option<&[f32]>;

    /// Whether `key` is stored.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory word vectors backed by one flat buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordVectors {
    dim: usize,
    index: HashMap<String, usize>,
    data: Vec<f32>,
}

impl WordVectors {
    /// Create an empty store of the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            index: HashMap::new(),
            data: Vec::new(),
        }
    }

    /// Store `vector` under `word`.
    ///
    /// Returns `false` (and keeps the existing vector) if `word` is already
    /// stored.
    pub fn insert(&mut self, word: impl Into<String>, vector: &[f32]) -> Result<bool> {
        let word = word.into();
        if vector.len() != self.dim {
            return Err(TagpackError::Format(format!(
                "vector for {:?} has {} values, expected {}",
                word,
                vector.len(),
                self.dim
            )));
        }
        if self.index.contains_key(&word) {
            return Ok(false);
        }
        self.index.insert(word, self.index.len());
        self.data.extend_from_slice(vector);
        Ok(true)
    }

    /// Number of stored words.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load vectors in word2vec text format.
    pub fn from_word2vec_text(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let vectors = Self::parse_word2vec_text(open_input(path, "open word vectors")?)?;
        tracing::info!(
            path = %path.display(),
            words = vectors.len(),
            dim = vectors.dim,
            "loaded word vectors"
        );
        Ok(vectors)
    }

    /// Parse word2vec text format.
    ///
    /// An optional `<count> <dim>` header line is accepted (GloVe files have
    /// none). Each following line is a word and its values separated by
    /// whitespace.
    pub fn parse_word2vec_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut vectors: Option<Self> = None;
        let mut values = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| TagpackError::Format(e.to_string()))?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };

            values.clear();
            for field in fields {
                let value = field.parse::<f32>().map_err(|_| {
                    TagpackError::Format(format!(
                        "line {}: invalid value {:?}",
                        lineno + 1,
                        field
                    ))
                })?;
                values.push(value);
            }

            if lineno == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                if let Ok(dim) = line.split_whitespace().nth(1).unwrap_or("").parse::<usize>() {
                    vectors = Some(Self::new(dim));
                    continue;
                }
            }

            let store = vectors.get_or_insert_with(|| Self::new(values.len()));
            if values.len() != store.dim {
                return Err(TagpackError::Format(format!(
                    "line {}: expected {} values, found {}",
                    lineno + 1,
                    store.dim,
                    values.len()
                )));
            }
            store.insert(word, &values)?;
        }

        Ok(vectors.unwrap_or_default())
    }
}

impl EmbeddingStore for WordVectors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, key: &str) -> Option<&[f32]> {
        let row = *self.index.get(key)?;
        let start = row * self.dim;
        self.data.get(start..start + self.dim)
    }
}

/// One named embedding source of a model.
pub struct EmbeddingSource {
    /// Identifier used in output file names.
    pub name: String,
    pub store: Box<dyn EmbeddingStore>,
}

impl EmbeddingSource {
    pub fn new(name: impl Into<String>, store: impl EmbeddingStore + 'static) -> Self {
        Self {
            name: name.into(),
            store: Box::new(store),
        }
    }
}

impl std::fmt::Debug for EmbeddingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSource")
            .field("name", &self.name)
            .field("dim", &self.store.dim())
            .finish()
    }
}
