use clap::Parser;
use tagpack_export::{GetEmbeddingsArgs, init_logging, run_get_embeddings};

fn main() {
    init_logging();
    let args = GetEmbeddingsArgs::parse();

    if let Err(e) = run_get_embeddings(&args) {
        eprintln!("get-embeddings failed: {:#}", e);
        std::process::exit(1);
    }
}
