//! `credx` — train, query, and update the article classifier, plus the
//! scraping and summarization helpers of the ingestion pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use credx_ai::{
    ClassifierService, Embedder, StubEncoder, TrainConfig, TrainingSample, initial_train,
};
use credx_store::{BundleStore, FsBundleStore};

#[derive(Parser)]
#[command(name = "credx")]
#[command(about = "Article classification and ingestion tools")]
#[command(version)]
struct Cli {
    /// Path of the model bundle file
    #[arg(long, env = "CREDX_BUNDLE", default_value = "bundle.json", global = true)]
    bundle: PathBuf,

    /// Directory with model.onnx + tokenizer.json; omit to use the
    /// deterministic stub encoder
    #[arg(long, env = "CREDX_MODEL_DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// Embedding width for the stub encoder
    #[arg(long, default_value_t = 384, global = true)]
    dim: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a fresh bundle from a JSONL corpus of {"text", "label"} lines
    Train {
        /// Path of the JSONL training corpus
        samples: PathBuf,

        /// Full passes over the corpus
        #[arg(long, default_value_t = 5)]
        epochs: usize,

        #[arg(long, default_value_t = 0.05)]
        learning_rate: f32,

        /// Drop classes with fewer samples than this
        #[arg(long, default_value_t = 2)]
        min_class_samples: usize,
    },

    /// Classify text (inline or from a file) against the trained bundle
    Classify {
        /// Text to classify; reads --file when omitted
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Number of labels to report
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },

    /// Incrementally update the online model from a JSONL batch
    Update {
        /// Path of the JSONL update batch, {"text", "label"} per line
        samples: PathBuf,
    },

    /// Extract keyword tags from a title and an article file
    Tags {
        title: String,

        /// Path of the article text
        file: PathBuf,

        #[arg(long, default_value_t = 15)]
        top_k: usize,
    },

    /// Fetch an article, verify its ownership tag, and print cleaned text
    Scrape {
        url: String,

        /// Expected content of the credx-verification meta tag
        #[arg(long)]
        code: String,
    },

    /// Summarize an article file via the generative endpoint
    Summarize {
        /// Path of the article text
        file: PathBuf,

        #[arg(long, env = "GEMINI_API_KEY")]
        api_key: String,

        #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("credx v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            samples,
            epochs,
            learning_rate,
            min_class_samples,
        } => {
            let embedder = build_embedder(cli.model_dir.as_deref(), cli.dim)?;
            let corpus = read_samples(&samples)?;
            let cfg = TrainConfig {
                epochs,
                learning_rate,
                min_class_samples,
            };
            let bundle = initial_train(&embedder, &corpus, &cfg)?;
            FsBundleStore::new(&cli.bundle).save(&bundle)?;
            println!(
                "trained {} classes from {} samples -> {}",
                bundle.labels.len(),
                corpus.len(),
                cli.bundle.display()
            );
        }

        Commands::Classify { text, file, top_k } => {
            let embedder = build_embedder(cli.model_dir.as_deref(), cli.dim)?;
            let text = match (text, file) {
                (Some(t), _) => t,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                (None, None) => anyhow::bail!("provide text or --file"),
            };

            let store: Arc<dyn BundleStore> = Arc::new(FsBundleStore::new(&cli.bundle));
            let service = ClassifierService::open(store, embedder)?;
            let result = service.classify(&text, top_k)?;

            println!("label: {} ({:.1}%)", result.label, result.confidence * 100.0);
            for (label, prob) in &result.top_probs {
                println!("  {label}: {:.4}", prob);
            }
        }

        Commands::Update { samples } => {
            let embedder = build_embedder(cli.model_dir.as_deref(), cli.dim)?;
            let batch = read_samples(&samples)?;
            let texts: Vec<&str> = batch.iter().map(|s| s.text.as_str()).collect();
            let labels: Vec<&str> = batch.iter().map(|s| s.label.as_str()).collect();

            let store: Arc<dyn BundleStore> = Arc::new(FsBundleStore::new(&cli.bundle));
            let service = ClassifierService::open(store, embedder)?;
            service.incremental_update(&texts, &labels)?;
            println!("applied {} samples to the online model", batch.len());
        }

        Commands::Tags { title, file, top_k } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            for tag in credx_pipeline::extract_tags(&title, &content, top_k) {
                println!("{tag}");
            }
        }

        Commands::Scrape { url, code } => {
            let scraper = credx_pipeline::Scraper::new()?;
            let html = scraper.fetch(&url).await?;
            anyhow::ensure!(
                credx_pipeline::verify(&html, &code),
                "verification meta tag missing or wrong for {url}"
            );
            println!("{}", credx_pipeline::clean(&html));
        }

        Commands::Summarize {
            file,
            api_key,
            base_url,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let client = credx_pipeline::SummaryClient::new(base_url, api_key);
            println!("{}", client.summarize(&content).await?);
        }
    }

    Ok(())
}

/// One `{"text": ..., "label": ...}` object per line.
fn read_samples(path: &Path) -> anyhow::Result<Vec<TrainingSample>> {
    let data =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut samples = Vec::new();
    for (i, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sample: TrainingSample = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid sample", path.display(), i + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn build_embedder(model_dir: Option<&Path>, dim: usize) -> anyhow::Result<Embedder> {
    #[cfg(feature = "onnx")]
    if let Some(dir) = model_dir {
        return Ok(Embedder::new(Arc::new(credx_ai::OnnxEncoder::load(dir)?)));
    }
    #[cfg(not(feature = "onnx"))]
    if model_dir.is_some() {
        anyhow::bail!("built without the `onnx` feature; rebuild with `--features onnx`");
    }
    Ok(Embedder::new(Arc::new(StubEncoder::new(dim))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn read_samples_parses_jsonl() {
        let dir = std::env::temp_dir().join("credx-cli-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("samples.jsonl");
        std::fs::write(
            &path,
            "{\"text\": \"a match report\", \"label\": \"sports\"}\n\n\
             {\"text\": \"compiler news\", \"label\": \"tech\"}\n",
        )
        .unwrap();

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, "sports");
        std::fs::remove_file(&path).unwrap();
    }
}
