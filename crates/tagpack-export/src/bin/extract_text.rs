use clap::Parser;
use tagpack_export::{ExtractTextArgs, init_logging, run_extract_text};

fn main() {
    init_logging();
    let args = ExtractTextArgs::parse();

    if let Err(e) = run_extract_text(&args) {
        eprintln!("extract-text failed: {:#}", e);
        std::process::exit(1);
    }
}
