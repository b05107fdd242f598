//! Command-line front ends for the exporters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tagpack_core::config::DEFAULT_TASK;
use tagpack_core::{Corpus, ExportConfig, SafetensorsModel, corpus};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::exporter::{export_embeddings, pack_model};

/// Install the stderr log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Pack a trained tagger for the inference runtime
#[derive(Debug, Parser)]
#[command(name = "pack-model")]
#[command(about = "Pack trained tagger parameters and tag vocabulary")]
#[command(version)]
pub struct PackModelArgs {
    /// Task name, used as the prefix of the tag vocabulary file
    #[arg(long, env = "TAGPACK_TASK", default_value = DEFAULT_TASK)]
    pub task: String,

    /// Trained model (safetensors)
    #[arg(long, env = "TAGPACK_SRC", default_value = "wnut17/best-model.safetensors")]
    pub src: PathBuf,

    /// Packed parameter file to write
    #[arg(long, env = "TAGPACK_TGT", default_value = "wnut17/wnut17.model")]
    pub tgt: PathBuf,

    /// Directory for the tag vocabulary (defaults to the task name)
    #[arg(long, env = "TAGPACK_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Drop the start/stop states from the CRF transition matrix
    #[arg(long, env = "TAGPACK_TRIM_TRANSITIONS")]
    pub trim_transitions: bool,
}

impl PackModelArgs {
    pub fn config(&self) -> ExportConfig {
        let out_dir = self
            .out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.task));
        ExportConfig::new(&self.task)
            .with_output_dir(out_dir)
            .with_trim_transitions(self.trim_transitions)
    }
}

pub fn run_pack_model(args: &PackModelArgs) -> Result<()> {
    let config = args.config();
    info!(src = %args.src.display(), task = %config.task, "Loading model");

    let model = SafetensorsModel::load(&args.src)
        .with_context(|| format!("failed to load model {}", args.src.display()))?;

    let report = pack_model(&config, &model, &args.tgt)
        .with_context(|| format!("failed to pack {}", args.tgt.display()))?;

    info!(
        labels = report.labels,
        tensors = report.parameters.len(),
        tgt = %args.tgt.display(),
        "Model packed"
    );
    Ok(())
}

/// Export the corpus vocabulary and per-source embedding tables
#[derive(Debug, Parser)]
#[command(name = "get-embeddings")]
#[command(about = "Export vocabulary and embedding tables for a tagging task")]
#[command(version)]
pub struct GetEmbeddingsArgs {
    /// Task name, used as the prefix of every output file
    #[arg(long, env = "TAGPACK_TASK", default_value = DEFAULT_TASK)]
    pub task: String,

    /// Trained model (safetensors)
    #[arg(long, env = "TAGPACK_SRC", default_value = "wnut17/best-model.safetensors")]
    pub file: PathBuf,

    /// Dev partition in column format (defaults to <task>/dev.txt)
    #[arg(long, env = "TAGPACK_DEV")]
    pub dev: Option<PathBuf>,

    /// Test partition in column format (defaults to <task>/test.txt)
    #[arg(long, env = "TAGPACK_TEST")]
    pub test: Option<PathBuf>,

    /// Output directory
    #[arg(long, env = "TAGPACK_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

impl GetEmbeddingsArgs {
    pub fn config(&self) -> ExportConfig {
        ExportConfig::new(&self.task).with_output_dir(&self.out_dir)
    }

    pub fn dev_path(&self) -> PathBuf {
        self.dev
            .clone()
            .unwrap_or_else(|| Path::new(&self.task).join("dev.txt"))
    }

    pub fn test_path(&self) -> PathBuf {
        self.test
            .clone()
            .unwrap_or_else(|| Path::new(&self.task).join("test.txt"))
    }
}

pub fn run_get_embeddings(args: &GetEmbeddingsArgs) -> Result<()> {
    let config = args.config();
    let (dev, test) = (args.dev_path(), args.test_path());

    info!(dev = %dev.display(), test = %test.display(), "Loading corpus");
    let corpus = Corpus::load(&dev, &test).context("failed to load corpus")?;

    info!(file = %args.file.display(), "Loading model");
    let mut model = SafetensorsModel::load(&args.file)
        .with_context(|| format!("failed to load model {}", args.file.display()))?;
    model
        .load_embeddings()
        .context("failed to load embedding sources")?;

    let report = export_embeddings(&config, &model, &corpus).context("embedding export failed")?;

    info!(
        vocabulary = report.vocabulary.len(),
        sources = report.sources.len(),
        "Embeddings exported"
    );
    Ok(())
}

/// Strip a column-format corpus down to its token column
#[derive(Debug, Parser)]
#[command(name = "extract-text")]
#[command(about = "Extract the token column of a column-format corpus")]
#[command(version)]
pub struct ExtractTextArgs {
    /// Column-format input
    pub input: PathBuf,

    /// Plain-text output
    pub output: PathBuf,
}

pub fn run_extract_text(args: &ExtractTextArgs) -> Result<()> {
    let count = corpus::extract_text(&args.input, &args.output).with_context(|| {
        format!(
            "failed to extract {} into {}",
            args.input.display(),
            args.output.display()
        )
    })?;
    info!(tokens = count, output = %args.output.display(), "Text extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    use safetensors::tensor::{Dtype, TensorView};
    use tagpack_core::{PackedParameters, VocabFile};

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn write_model(dir: &Path) -> PathBuf {
        let transitions = f32_bytes(&(0..9).map(|v| v as f32).collect::<Vec<_>>());
        let weight = f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let bias = f32_bytes(&[0.5, 0.5]);

        let tensors = vec![
            (
                "transitions".to_string(),
                TensorView::new(Dtype::F32, vec![3, 3], &transitions).unwrap(),
            ),
            (
                "linear.weight".to_string(),
                TensorView::new(Dtype::F32, vec![2, 3], &weight).unwrap(),
            ),
            (
                "linear.bias".to_string(),
                TensorView::new(Dtype::F32, vec![2], &bias).unwrap(),
            ),
        ];

        fs::write(dir.join("glove.txt"), "paris 1.0 2.0\ng## 3.0 4.0\n").unwrap();

        let mut meta = HashMap::new();
        meta.insert(
            "parameter_order".to_string(),
            serde_json::json!(["transitions", "linear.weight", "linear.bias"]).to_string(),
        );
        meta.insert(
            "tag_dictionary".to_string(),
            serde_json::json!(["O", "B-LOC", ""]).to_string(),
        );
        meta.insert(
            "embeddings".to_string(),
            serde_json::json!([{ "name": "glove", "path": "glove.txt" }]).to_string(),
        );

        let bytes = safetensors::serialize(tensors, &Some(meta)).unwrap();
        let path = dir.join("best-model.safetensors");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_pack_model_args_defaults() {
        let args = PackModelArgs::try_parse_from(["pack-model"]).unwrap();
        assert_eq!(args.task, "wnut17");
        assert_eq!(args.tgt, PathBuf::from("wnut17/wnut17.model"));
        assert!(!args.trim_transitions);

        let config = args.config();
        assert_eq!(config.tag_vocab_path(), PathBuf::from("wnut17/wnut17.tag.vocab"));
    }

    #[test]
    fn test_get_embeddings_args_default_partitions() {
        let args = GetEmbeddingsArgs::try_parse_from(["get-embeddings", "--task", "conll03"]).unwrap();
        assert_eq!(args.dev_path(), PathBuf::from("conll03/dev.txt"));
        assert_eq!(args.test_path(), PathBuf::from("conll03/test.txt"));
        assert_eq!(args.config().vocab_path(), PathBuf::from("./conll03.vocab"));
    }

    #[test]
    fn test_run_pack_model_from_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_model(dir.path());
        let tgt = dir.path().join("out.model");

        let args = PackModelArgs {
            task: "toy".into(),
            src,
            tgt: tgt.clone(),
            out_dir: Some(dir.path().to_path_buf()),
            trim_transitions: false,
        };
        run_pack_model(&args).unwrap();

        let packed = PackedParameters::read(&tgt).unwrap();
        assert_eq!(packed.sizes(), vec![9, 6, 2]);
        // linear.weight is written transposed
        assert_eq!(packed.tensor(1).unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let tags = fs::read_to_string(dir.path().join("toy.tag.vocab")).unwrap();
        assert_eq!(tags, "3\nO\t0\nB-LOC\t1\n<>\t2\n");
    }

    #[test]
    fn test_run_get_embeddings_from_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_model(dir.path());
        let dev = dir.path().join("dev.txt");
        let test = dir.path().join("test.txt");
        fs::write(&dev, "Paris B-LOC\nin O\n\nG20 O\n").unwrap();
        fs::write(&test, "-DOCSTART- O\n\nparis B-LOC\n").unwrap();

        let args = GetEmbeddingsArgs {
            task: "toy".into(),
            file,
            dev: Some(dev),
            test: Some(test),
            out_dir: dir.path().join("out"),
        };
        run_get_embeddings(&args).unwrap();

        let vocab = fs::read_to_string(dir.path().join("out/toy.vocab")).unwrap();
        assert_eq!(vocab, "4\nParis\t1\nin\t2\nG20\t3\nparis\t4\n");

        let emb_vocab = VocabFile::read(args.config().embedding_vocab_path("glove")).unwrap();
        assert_eq!(emb_vocab.id("<PAD>"), Some(0));
        assert_eq!(emb_vocab.id("Paris"), Some(1));
        assert_eq!(emb_vocab.id("g##"), Some(2));
        assert_eq!(emb_vocab.id("in"), None);
    }

    #[test]
    fn test_run_extract_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dev.txt");
        let output = dir.path().join("dev.plain");
        fs::write(&input, "Hello O\nworld O\n\nBye O\n").unwrap();

        run_extract_text(&ExtractTextArgs { input, output: output.clone() }).unwrap();
        assert_eq!(fs::read_to_string(output).unwrap(), "Hello\nworld\n\nBye\n");
    }
}
