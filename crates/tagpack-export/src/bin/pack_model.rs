use clap::Parser;
use tagpack_export::{PackModelArgs, init_logging, run_pack_model};

fn main() {
    init_logging();
    let args = PackModelArgs::parse();

    if let Err(e) = run_pack_model(&args) {
        eprintln!("pack-model failed: {:#}", e);
        std::process::exit(1);
    }
}
