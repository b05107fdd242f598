//! Export runs: everything one command writes, in order.

use std::path::Path;

use tagpack_core::embedding::{ResolvedVocabulary, export_embedding_source};
use tagpack_core::params::{PackedTensor, ParameterPacker};
use tagpack_core::{Corpus, ExportConfig, Result, TaggerModel, Vocabulary};

/// What `pack_model` wrote.
#[derive(Debug, Clone)]
pub struct PackReport {
    pub labels: usize,
    pub parameters: Vec<PackedTensor>,
}

/// Write the tag vocabulary, then pack the model parameters into `target`.
pub fn pack_model(
    config: &ExportConfig,
    model: &dyn TaggerModel,
    target: &Path,
) -> Result<PackReport> {
    config.ensure_output_dir()?;

    let tags = model.tag_vocabulary();
    tags.save(config.tag_vocab_path())?;

    let params = model.named_parameters()?;
    let parameters = ParameterPacker::from_config(config).pack_to_file(params, target)?;

    Ok(PackReport {
        labels: tags.len(),
        parameters,
    })
}

/// What `export_embeddings` wrote.
#[derive(Debug, Clone)]
pub struct EmbeddingReport {
    pub vocabulary: Vocabulary,
    pub sources: Vec<(String, ResolvedVocabulary)>,
}

/// Write the corpus vocabulary, then one vocabulary/table pair per embedding
/// source of `model`.
pub fn export_embeddings(
    config: &ExportConfig,
    model: &dyn TaggerModel,
    corpus: &Corpus,
) -> Result<EmbeddingReport> {
    config.ensure_output_dir()?;

    let vocabulary = Vocabulary::build(corpus);
    vocabulary.save(config.vocab_path())?;

    let mut sources = Vec::new();
    for source in model.embedding_sources() {
        let resolved = export_embedding_source(config, &vocabulary, source)?;
        sources.push((source.name.clone(), resolved));
    }

    Ok(EmbeddingReport {
        vocabulary,
        sources,
    })
}
