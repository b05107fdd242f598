//! # Tagpack Core
//!
//! Exports a trained sequence tagger into the flat binary format read by the
//! inference runtime: packed parameter tensors, word-embedding tables with
//! their vocabularies, and the tag vocabulary.
//!
//! ## Quick Start
//!
//! ```rust
//! use tagpack_core::corpus::Sentence;
//! use tagpack_core::embedding::{ResolvedVocabulary, WordVectors};
//! use tagpack_core::vocab::Vocabulary;
//!
//! let vocab = Vocabulary::from_sentences(&[Sentence::from_tokens(["Paris", "G20"])]);
//!
//! let mut vectors = WordVectors::new(2);
//! vectors.insert("paris", &[0.1, 0.2]).unwrap();
//! vectors.insert("g##", &[0.3, 0.4]).unwrap();
//!
//! let resolved = ResolvedVocabulary::resolve(&vocab, &vectors).unwrap();
//! assert_eq!(resolved.id("Paris"), Some(1));
//! assert_eq!(resolved.id("g##"), Some(2));
//! assert_eq!(resolved.next_id(), 3);
//! ```
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod format;
pub mod model;
pub mod params;
pub mod tags;
pub mod vocab;

// Re-export primary API
pub use config::ExportConfig;
pub use corpus::{Corpus, Sentence};
pub use embedding::{
    EmbeddingSource, EmbeddingStore, EmbeddingTable, LoadedEmbeddings, ResolutionTier,
    ResolvedVocabulary, WordVectors, export_embedding_source,
};
pub use error::{Result, TagpackError};
pub use model::{InMemoryTagger, SafetensorsModel, TaggerModel};
pub use params::{NamedTensor, PackedParameters, PackedTensor, ParameterPacker};
pub use tags::TagVocabulary;
pub use vocab::{VocabFile, Vocabulary};
