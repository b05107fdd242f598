//! # Tagpack Export
//!
//! Command-line exporters built on `tagpack-core`:
//!
//! - `pack-model` writes the tag vocabulary and the packed parameter file
//! - `get-embeddings` writes the corpus vocabulary and one embedding
//!   vocabulary/table pair per embedding source of the model
//! - `extract-text` keeps only the token column of a corpus file

pub mod cli;
pub mod exporter;

pub use cli::{
    ExtractTextArgs, GetEmbeddingsArgs, PackModelArgs, init_logging, run_extract_text,
    run_get_embeddings, run_pack_model,
};
pub use exporter::{EmbeddingReport, PackReport, export_embeddings, pack_model};
