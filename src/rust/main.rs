use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use moodlens::model_manager::DEFAULT_MODEL_NAME;
use moodlens::web::{self, AppState};
use moodlens::{
    ArtifactManifest, Classifier, ConfigPaths, EmotionPredictor, ModelStore, PredictOptions, RuntimeConfig,
    DEFAULT_MAX_LENGTH, DEFAULT_TOP_K_FALLBACK,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the web front end
    Serve {
        #[command(flatten)]
        model: ModelArgs,
        /// Address to listen on
        #[arg(long, env = "MOODLENS_BIND", default_value = "127.0.0.1:8501")]
        bind: String,
    },
    /// Classify one text and print the result
    Predict {
        /// Text to analyze
        text: String,
        /// Emotions to report when none clears its threshold
        #[arg(long, default_value_t = DEFAULT_TOP_K_FALLBACK)]
        top_k: usize,
        /// Also print every class probability against its threshold
        #[arg(long)]
        show_all: bool,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Download and verify the model artifacts described by a manifest
    Fetch {
        /// JSON manifest with artifact URLs and SHA-256 digests
        #[arg(long)]
        manifest: PathBuf,
        /// Directory to store model.onnx and tokenizer.json in
        #[arg(long, env = "MOODLENS_MODEL_DIR")]
        model_dir: Option<PathBuf>,
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Directory holding classes.txt, thresholds.json and retune_config.json
    #[arg(long, env = "MOODLENS_CONFIG_DIR", default_value = "configs")]
    config_dir: PathBuf,
    /// Directory holding model.onnx and tokenizer.json
    #[arg(long, env = "MOODLENS_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    /// Token budget per input
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,
    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,
    /// Verify the model artifacts against this manifest before loading
    #[arg(long)]
    manifest: Option<PathBuf>,
}

fn resolve_model_dir(model_dir: Option<PathBuf>) -> PathBuf {
    model_dir.unwrap_or_else(|| ModelStore::get_default_models_dir().join(DEFAULT_MODEL_NAME))
}

fn load_classifier(args: ModelArgs) -> anyhow::Result<Classifier> {
    let model_dir = resolve_model_dir(args.model_dir);

    if let Some(manifest_path) = &args.manifest {
        let manifest = ArtifactManifest::load(manifest_path)
            .with_context(|| format!("reading manifest {:?}", manifest_path))?;
        let store = ModelStore::new(&model_dir)?;
        if !store.verify(&manifest)? {
            bail!("Model artifacts in {:?} do not match {:?}; run `moodlens fetch` first", model_dir, manifest_path);
        }
    }

    let start_time = Instant::now();
    info!("Building classifier from {:?}...", model_dir);

    let classifier = Classifier::builder()
        .with_runtime_config(RuntimeConfig::with_intra_threads(args.intra_threads))
        .with_max_length(args.max_length)?
        .with_config_paths(&ConfigPaths::in_dir(&args.config_dir))?
        .with_model_dir(&model_dir)?
        .build()?;

    info!("=== Classifier Built Successfully (took {:.2?}) ===", start_time.elapsed());
    Ok(classifier)
}

fn print_prediction(classifier: &Classifier, text: &str, top_k: usize, show_all: bool) -> anyhow::Result<()> {
    let options = PredictOptions {
        top_k_fallback: top_k,
        ..classifier.default_options()
    };
    let start = Instant::now();
    let prediction = classifier.predict_with(text, &options)?;
    info!("Classification took {:.2?}", start.elapsed());

    let mut selected: Vec<_> = prediction.selected.iter().collect();
    selected.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(std::cmp::Ordering::Equal));

    println!("\nResults ({} tokens):", classifier.count_tokens(text)?);
    if selected.is_empty() {
        println!("  No emotion identified with sufficient confidence.");
    } else if prediction.fallback {
        println!("  No emotion cleared its threshold; top {} shown:", selected.len());
    }
    for score in selected {
        println!("    {}: {:.3}", score.label, score.probability);
    }

    if show_all {
        let info = classifier.info();
        println!("\n  All probabilities:");
        for ((label, probability), threshold) in info
            .class_labels
            .iter()
            .zip(&prediction.probabilities)
            .zip(&info.thresholds)
        {
            let mark = if f64::from(*probability) >= *threshold { "+" } else { "-" };
            println!("    {} {}: {:.3} (threshold: {:.3})", mark, label, probability, threshold);
        }
    }
    Ok(())
}

async fn fetch(manifest: PathBuf, model_dir: Option<PathBuf>, fresh: bool) -> anyhow::Result<()> {
    let manifest = ArtifactManifest::load(&manifest)
        .with_context(|| format!("reading manifest {:?}", manifest))?;
    let store = match model_dir {
        Some(dir) => ModelStore::new(dir)?,
        None => ModelStore::new_default()?,
    };

    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        store.remove()?;
    }

    store.fetch(&manifest).await?;
    if !store.verify(&manifest)? {
        warn!("Artifacts in {:?} failed verification after download", store.model_dir());
        bail!("Model verification failed");
    }
    println!("Model artifacts ready in {}", store.model_dir().display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moodlens::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { model, bind } => {
            info!("=== Starting emotion classifier service ===");
            let classifier = load_classifier(model)?;
            let state = AppState::new(Arc::new(classifier))?;
            web::serve(state, &bind).await?;
        }
        Command::Predict { text, top_k, show_all, model } => {
            if let Err(warning) = web::input::check(&text) {
                bail!("{}", warning);
            }
            let classifier = load_classifier(model)?;
            print_prediction(&classifier, &text, top_k, show_all)?;
        }
        Command::Fetch { manifest, model_dir, fresh } => {
            fetch(manifest, model_dir, fresh).await?;
        }
    }

    Ok(())
}
