//! Embedding vocabulary/table pairs.
//!
//! An export writes two files from one resolution pass:
//!
//! - `<task><source>.emb.vocab`: count of registered strings, `<PAD>\t0`,
//!   then `string\tid` in registration order;
//! - `<task><source>.emb`: u64 row count (= next unassigned id), u64
//!   dimensionality, a zero row for padding, then one row per resolved token.
//!
//! The files only agree with each other when produced together, so writing
//! them is a single operation.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::config::ExportConfig;
use crate::embedding::resolve::{ResolutionTier, ResolvedVocabulary};
use crate::embedding::store::{EmbeddingSource, EmbeddingStore};
use crate::error::{Result, TagpackError};
use crate::format::{
    expect_eof, open_input, read_f32s, read_u64, to_len, write_f32s, write_file, write_u64,
    write_zeros,
};
use crate::vocab::{PAD_ID, PAD_TOKEN, VocabFile, Vocabulary};

/// Resolve `vocab` against one embedding source and write its vocabulary and
/// table files.
pub fn export_embedding_source(
    config: &ExportConfig,
    vocab: &Vocabulary,
    source: &EmbeddingSource,
) -> Result<ResolvedVocabulary> {
    let store = source.store.as_ref();
    let resolved = ResolvedVocabulary::resolve(vocab, store)?;

    for tier in ResolutionTier::all() {
        tracing::debug!(
            source = %source.name,
            tier = %tier,
            tokens = resolved.tier_count(*tier),
            "resolved tokens"
        );
    }
    if resolved.resolved() == 0 && !vocab.is_empty() {
        tracing::warn!(source = %source.name, "no vocabulary token found in embedding source");
    }

    let vocab_path = config.embedding_vocab_path(&source.name);
    write_file(&vocab_path, "write embedding vocabulary", |w| {
        write_resolved_vocab(&resolved, w)
    })?;

    let table_path = config.embedding_table_path(&source.name);
    write_file(&table_path, "write embedding table", |w| {
        write_table(&resolved, store, w)
    })?;

    tracing::info!(
        source = %source.name,
        rows = resolved.next_id(),
        dim = store.dim(),
        dropped = resolved.dropped(),
        table = %table_path.display(),
        "wrote embedding table"
    );

    Ok(resolved)
}

fn write_resolved_vocab<W: Write>(resolved: &ResolvedVocabulary, w: &mut W) -> std::io::Result<()> {
    writeln!(w, "{}", resolved.entries().len())?;
    writeln!(w, "{}\t{}", PAD_TOKEN, PAD_ID)?;
    for (key, id) in resolved.entries() {
        writeln!(w, "{}\t{}", key, id)?;
    }
    Ok(())
}

fn write_table<W: Write>(
    resolved: &ResolvedVocabulary,
    store: &dyn EmbeddingStore,
    w: &mut W,
) -> std::io::Result<()> {
    let dim = store.dim();
    write_u64(w, resolved.next_id())?;
    write_u64(w, dim as u64)?;
    write_zeros(w, dim)?;
    for form in resolved.rows() {
        let vector = store.get(form).ok_or_else(|| {
            std::io::Error::other(format!("embedding for {:?} disappeared from store", form))
        })?;
        write_f32s(w, vector)?;
    }
    Ok(())
}

/// An embedding table read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingTable {
    /// Parse the binary form.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let rows = to_len(read_u64(reader)?, "row count")?;
        let dim = to_len(read_u64(reader)?, "embedding size")?;
        let len = rows.checked_mul(dim).ok_or_else(|| {
            TagpackError::Format(format!("table of {} x {} overflows", rows, dim))
        })?;
        let data = read_f32s(reader, len)?;
        expect_eof(reader)?;
        Ok(Self { rows, dim, data })
    }

    /// Read a table file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(&mut open_input(path, "open embedding table")?)
    }

    /// Row count including the padding row.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The vector stored for `id`.
    pub fn row(&self, id: u64) -> Option<&[f32]> {
        let start = usize::try_from(id).ok()?.checked_mul(self.dim)?;
        self.data.get(start..start.checked_add(self.dim)?)
    }
}

/// A vocabulary/table pair loaded together.
#[derive(Debug, Clone)]
pub struct LoadedEmbeddings {
    ids: HashMap<String, u64>,
    table: EmbeddingTable,
}

impl LoadedEmbeddings {
    /// Load a pair, checking that every id addresses a table row.
    pub fn load(vocab_path: impl AsRef<Path>, table_path: impl AsRef<Path>) -> Result<Self> {
        let vocab = VocabFile::read(vocab_path)?;
        let table = EmbeddingTable::read(table_path)?;

        if let Some((token, id)) = vocab
            .entries
            .iter()
            .find(|(_, id)| *id >= table.rows() as u64)
        {
            return Err(TagpackError::Format(format!(
                "token {:?} has id {} but the table has {} rows",
                token,
                id,
                table.rows()
            )));
        }

        Ok(Self {
            ids: vocab.to_map(),
            table,
        })
    }

    /// Id of `token`, if it was registered.
    pub fn id(&self, token: &str) -> Option<u64> {
        self.ids.get(token).copied()
    }

    /// Vector of `token`, if it was registered.
    pub fn vector(&self, token: &str) -> Option<&[f32]> {
        self.table.row(self.id(token)?)
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}
