pub mod resolve;
pub mod store;
pub mod table;

pub use resolve::{ResolutionTier, ResolvedVocabulary, TokenNormalizer};
pub use store::{EmbeddingSource, EmbeddingStore, WordVectors};
pub use table::{EmbeddingTable, LoadedEmbeddings, export_embedding_source};
