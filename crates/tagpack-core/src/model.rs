//! # Tagger Models
//!
//! The exporters only see a model through [`TaggerModel`]: its ordered named
//! parameters, its embedding sources and its label dictionary.
//!
//! [`SafetensorsModel`] reads all three from a `.safetensors` file. Tensor
//! data comes from the file body; the `__metadata__` header carries the rest:
//!
//! - `parameter_order`: JSON array of tensor names. Without it, tensors are
//!   taken in the order their data is laid out in the file.
//! - `tag_dictionary`: JSON array of labels, position = id. A label is either
//!   a string or an array of byte values holding UTF-8.
//! - `embeddings`: JSON array of `{"name", "path"}` pointing at word2vec text
//!   files; relative paths are resolved against the model's directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use candle_core::Device;
use candle_core::safetensors::Load;
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};

use crate::embedding::{EmbeddingSource, WordVectors};
use crate::error::{Result, TagpackError};
use crate::params::NamedTensor;
use crate::tags::TagVocabulary;

/// Metadata key holding the parameter order.
pub const PARAMETER_ORDER_KEY: &str = "parameter_order";
/// Metadata key holding the label dictionary.
pub const TAG_DICTIONARY_KEY: &str = "tag_dictionary";
/// Metadata key holding the embedding sources.
pub const EMBEDDINGS_KEY: &str = "embeddings";

/// What an exporter needs from a trained sequence tagger.
pub trait TaggerModel {
    /// Parameters in the model's own order.
    fn named_parameters(&self) -> Result<Vec<NamedTensor>>;

    /// Word-embedding sources.
    fn embedding_sources(&self) -> &[EmbeddingSource];

    /// Label dictionary, position = id.
    fn labels(&self) -> &[String];

    /// The label dictionary as a tag vocabulary.
    fn tag_vocabulary(&self) -> TagVocabulary {
        TagVocabulary::new(self.labels().to_vec())
    }
}

/// An embedding source declared in model metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    pub name: String,
    pub path: PathBuf,
}

/// One `tag_dictionary` entry as stored in metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Bytes(Vec<u8>),
}

impl AsRef<[u8]> for RawLabel {
    fn as_ref(&self) -> &[u8] {
        match self {
            RawLabel::Text(text) => text.as_bytes(),
            RawLabel::Bytes(bytes) => bytes,
        }
    }
}

/// A tagger stored as a safetensors file.
pub struct SafetensorsModel {
    path: PathBuf,
    buffer: Vec<u8>,
    order: Vec<String>,
    labels: Vec<String>,
    specs: Vec<EmbeddingSpec>,
    embeddings: Vec<EmbeddingSource>,
}

impl SafetensorsModel {
    /// Read the model file and its metadata. Embedding sources are not
    /// loaded until [`SafetensorsModel::load_embeddings`] is called.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buffer = std::fs::read(path).map_err(|e| TagpackError::io("read model", path, e))?;
        let model = Self::from_buffer(path, buffer)?;

        tracing::info!(
            path = %path.display(),
            parameters = model.order.len(),
            labels = model.labels.len(),
            embeddings = model.specs.len(),
            "loaded model"
        );
        Ok(model)
    }

    fn from_buffer(path: &Path, buffer: Vec<u8>) -> Result<Self> {
        let (_, metadata) = SafeTensors::read_metadata(&buffer)?;
        let extra = metadata.metadata().clone().unwrap_or_default();

        let mut stored: Vec<(usize, String)> = metadata
            .tensors()
            .into_iter()
            .map(|(name, info)| (info.data_offsets.0, name))
            .collect();
        stored.sort();
        let stored: Vec<String> = stored.into_iter().map(|(_, name)| name).collect();

        let order = match extra.get(PARAMETER_ORDER_KEY) {
            Some(json) => checked_order(parse_json(PARAMETER_ORDER_KEY, json)?, &stored)?,
            None => {
                tracing::warn!(
                    path = %path.display(),
                    "no {} metadata, packing tensors in storage order",
                    PARAMETER_ORDER_KEY
                );
                stored
            }
        };
        let raw_labels: Vec<RawLabel> = optional_json(&extra, TAG_DICTIONARY_KEY)?;
        let labels = TagVocabulary::from_bytes(&raw_labels)?.labels().to_vec();
        let specs = optional_json(&extra, EMBEDDINGS_KEY)?;

        Ok(Self {
            path: path.to_path_buf(),
            buffer,
            order,
            labels,
            specs,
            embeddings: Vec::new(),
        })
    }

    /// Load every declared embedding source.
    pub fn load_embeddings(&mut self) -> Result<()> {
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        self.embeddings = self
            .specs
            .iter()
            .map(|spec| {
                let vectors = WordVectors::from_word2vec_text(base.join(&spec.path))?;
                Ok(EmbeddingSource::new(spec.name.clone(), vectors))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Embedding sources declared in the metadata.
    pub fn embedding_specs(&self) -> &[EmbeddingSpec] {
        &self.specs
    }

    /// Parameter names in export order.
    pub fn parameter_names(&self) -> &[String] {
        &self.order
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaggerModel for SafetensorsModel {
    fn named_parameters(&self) -> Result<Vec<NamedTensor>> {
        let tensors = SafeTensors::deserialize(&self.buffer)?;
        self.order
            .iter()
            .map(|name| {
                let tensor = tensors.tensor(name)?.load(&Device::Cpu)?;
                Ok(NamedTensor::new(name.clone(), tensor))
            })
            .collect()
    }

    fn embedding_sources(&self) -> &[EmbeddingSource] {
        &self.embeddings
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A tagger assembled in memory.
#[derive(Debug, Default)]
pub struct InMemoryTagger {
    pub parameters: Vec<NamedTensor>,
    pub embeddings: Vec<EmbeddingSource>,
    pub labels: Vec<String>,
}

impl TaggerModel for InMemoryTagger {
    fn named_parameters(&self) -> Result<Vec<NamedTensor>> {
        Ok(self.parameters.clone())
    }

    fn embedding_sources(&self) -> &[EmbeddingSource] {
        &self.embeddings
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(key: &str, json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| TagpackError::Model(format!("invalid {} metadata: {}", key, e)))
}

fn optional_json<T>(extra: &HashMap<String, String>, key: &str) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    match extra.get(key) {
        Some(json) => parse_json(key, json),
        None => Ok(Vec::new()),
    }
}

fn checked_order(order: Vec<String>, stored: &[String]) -> Result<Vec<String>> {
    let known: HashSet<&str> = stored.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for name in &order {
        if !known.contains(name.as_str()) {
            return Err(TagpackError::Model(format!(
                "{} names unknown tensor {:?}",
                PARAMETER_ORDER_KEY, name
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(TagpackError::Model(format!(
                "{} lists {:?} twice",
                PARAMETER_ORDER_KEY, name
            )));
        }
    }
    let missing: Vec<&str> = stored
        .iter()
        .map(String::as_str)
        .filter(|name| !seen.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(TagpackError::Model(format!(
            "{} leaves out stored tensors {:?}",
            PARAMETER_ORDER_KEY, missing
        )));
    }
    Ok(order)
}
