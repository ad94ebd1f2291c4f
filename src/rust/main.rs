use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use sentiment_tuner::dataset::{DEFAULT_CONFIG, DEFAULT_DATASET};
use sentiment_tuner::{
    BuiltinModel, DatasetSource, DemoServer, ModelManager, OnnxEncoder, OptimizationLevel, RuntimeConfig,
    SampleCache, SampleConfig, SentimentClassifier, ServerConfig, TrainConfig, TrainingPipeline,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// ONNX Runtime graph optimization level
    #[arg(long, value_enum, global = true, default_value = "level3")]
    optimization_level: OptimizationLevel,
}

#[derive(Subcommand)]
enum Command {
    /// Download and verify the encoder files
    Download {
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
    /// Sample the corpus, fine-tune the head, evaluate and save it
    Train(TrainArgs),
    /// Classify a single text with a saved model
    Predict {
        #[arg(long, default_value = "sentiment-model")]
        model_dir: PathBuf,
        #[arg(long)]
        text: String,
    },
    /// Serve the demo form for a saved model
    Serve {
        #[arg(long, default_value = "sentiment-model")]
        model_dir: PathBuf,
        #[arg(long, default_value = sentiment_tuner::server::DEFAULT_ADDR)]
        addr: SocketAddr,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Dataset on the Hugging Face hub
    #[arg(long, default_value = DEFAULT_DATASET)]
    dataset: String,
    #[arg(long, default_value = DEFAULT_CONFIG)]
    dataset_config: String,
    /// Read `train.jsonl` / `test.jsonl` from this directory instead of the hub
    #[arg(long)]
    local_data: Option<PathBuf>,
    #[arg(long, default_value_t = 3000)]
    train_size: usize,
    #[arg(long, default_value_t = 300)]
    test_size: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Always refetch the samples instead of using the on-disk cache
    #[arg(long)]
    no_cache: bool,
    #[arg(long, default_value_t = 1e-3)]
    lr: f64,
    #[arg(long, default_value_t = 1e-2)]
    weight_decay: f64,
    #[arg(long, default_value_t = 16)]
    batch_size: usize,
    #[arg(long, default_value_t = 2)]
    epochs: usize,
    #[arg(long, default_value_t = 500)]
    save_steps: usize,
    /// 0 keeps every step checkpoint
    #[arg(long, default_value_t = 2)]
    save_total_limit: usize,
    #[arg(long, default_value = "sentiment-model")]
    output_dir: PathBuf,
}

impl From<&TrainArgs> for SampleConfig {
    fn from(args: &TrainArgs) -> Self {
        SampleConfig {
            train_size: args.train_size,
            test_size: args.test_size,
            seed: args.seed,
            ..SampleConfig::default()
        }
    }
}

impl From<&TrainArgs> for TrainConfig {
    fn from(args: &TrainArgs) -> Self {
        TrainConfig {
            lr: args.lr,
            weight_decay: args.weight_decay,
            batch_size: args.batch_size,
            epochs: args.epochs,
            seed: args.seed,
            save_steps: args.save_steps,
            save_total_limit: (args.save_total_limit > 0).then_some(args.save_total_limit),
            output_dir: args.output_dir.clone(),
        }
    }
}

impl TrainArgs {
    fn source(&self) -> DatasetSource {
        match &self.local_data {
            Some(dir) => DatasetSource::local(dir),
            None => DatasetSource::hub(&self.dataset, &self.dataset_config),
        }
    }
}

async fn load_classifier(
    manager: &ModelManager,
    runtime: &RuntimeConfig,
    model_dir: &Path,
) -> anyhow::Result<SentimentClassifier> {
    let model = BuiltinModel::MiniLM;
    manager.ensure_model_downloaded(model).await?;
    let encoder = OnnxEncoder::from_builtin(manager, model, runtime)?;
    SentimentClassifier::load(model_dir, Arc::new(encoder))
        .with_context(|| format!("Failed to load model from {:?}; run `train` first", model_dir))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let runtime = RuntimeConfig {
        optimization_level: cli.optimization_level,
        ..RuntimeConfig::default()
    };
    let manager = ModelManager::new_default().context("Failed to create the model cache directory")?;

    match cli.command {
        Command::Download { fresh } => {
            let model = BuiltinModel::MiniLM;
            if fresh {
                info!("Fresh download requested - removing any existing model files...");
                manager.remove_download(model)?;
            }
            manager.ensure_model_downloaded(model).await?;
            println!("{} ready in {:?}", model.name(), manager.models_dir());
        }
        Command::Train(args) => {
            let start_time = Instant::now();
            let pipeline = TrainingPipeline {
                source: args.source(),
                sample: SampleConfig::from(&args),
                train: TrainConfig::from(&args),
                runtime,
                cache: (!args.no_cache).then(SampleCache::default_location),
                ..TrainingPipeline::default()
            };
            let run = pipeline.run(&manager).await?;

            info!("=== Training finished (took {:.2?}) ===", start_time.elapsed());
            for epoch in &run.outcome.history {
                println!("epoch {} train_loss={:.4} {}", epoch.epoch, epoch.train_loss, epoch.eval);
            }
            println!("test {}", run.test_report);
            println!("model saved to {:?}", run.outcome.model_dir);
        }
        Command::Predict { model_dir, text } => {
            let classifier = load_classifier(&manager, &runtime, &model_dir).await?;
            let prediction = classifier.predict(&text)?;
            println!("{}", serde_json::to_string(&prediction)?);
        }
        Command::Serve { model_dir, addr } => {
            let classifier = load_classifier(&manager, &runtime, &model_dir).await?;
            let config = ServerConfig {
                addr,
                ..ServerConfig::default()
            };
            let handle = DemoServer::launch(Arc::new(classifier), config).await?;
            println!("Demo running on {}", handle.url());

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            handle.close().await?;
        }
    }

    Ok(())
}
