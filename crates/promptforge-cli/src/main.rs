use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use promptforge_contracts::{ErrorClass, PipelineError};
use promptforge_engine::{
    DryrunProvider, GeminiProvider, GenerationRequest, ImageProviderRegistry, Pipeline, Settings,
    DEFAULT_OUTPUT_DIR,
};
use serde_json::Value;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "promptforge",
    version,
    about = "Turn a structured prompt document into one generated image"
)]
#[command(group(
    ArgGroup::new("prompt")
        .required(true)
        .args(["prompt_json", "prompt_file"])
))]
struct Cli {
    /// Prompt document as an inline JSON string.
    #[arg(long, value_name = "JSON")]
    prompt_json: Option<String>,
    /// Path to a prompt document.
    #[arg(long, value_name = "PATH")]
    prompt_file: Option<PathBuf>,
    /// Reference images, matched to the document's declared images.
    #[arg(long, num_args = 1.., value_name = "PATH")]
    input_images: Vec<PathBuf>,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Override file read before the process environment.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    /// Render a local placeholder instead of calling the service.
    #[arg(long)]
    dry_run: bool,
    /// Print the rendered prompt text to stderr before dispatch.
    #[arg(long)]
    print_prompt: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("promptforge error: {err:#}");
        let code = match err.downcast_ref::<PipelineError>() {
            Some(pipeline_err) => {
                eprintln!("{}: {}", pipeline_err.kind(), pipeline_err.class().hint());
                exit_code(pipeline_err.class())
            }
            None => 1,
        };
        std::process::exit(code);
    }
}

/// `RUST_LOG` decides unless `-v` is given; without either, INFO.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str())),
        1 => EnvFilter::new(Level::DEBUG.as_str()),
        _ => EnvFilter::new(Level::TRACE.as_str()),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn exit_code(class: ErrorClass) -> i32 {
    match class {
        ErrorClass::Input => 2,
        ErrorClass::Credentials => 3,
        ErrorClass::Retryable => 4,
        ErrorClass::Environment => 5,
    }
}

fn read_prompt(cli: &Cli) -> Result<Value> {
    let raw = match (&cli.prompt_json, &cli.prompt_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        (None, None) => anyhow::bail!("one of --prompt-json or --prompt-file is required"),
    };
    let value = serde_json::from_str(&raw)
        .map_err(|err| PipelineError::schema(format!("prompt is not valid JSON: {err}")))?;
    Ok(value)
}

fn run(cli: Cli) -> Result<()> {
    let prompt = read_prompt(&cli)?;
    let settings = Settings::load(cli.env_file.as_deref()).context("failed to load configuration")?;
    match settings.api_key_source.as_deref() {
        Some(source) => tracing::debug!(source, "api key resolved"),
        None => tracing::debug!("no api key configured"),
    }
    let model = cli.model.clone().unwrap_or_else(|| settings.model.clone());

    let mut registry = ImageProviderRegistry::new();
    registry.register(DryrunProvider);
    registry.register(GeminiProvider::from_settings(settings));
    let provider_name = if cli.dry_run { "dryrun" } else { "gemini" };
    let provider = registry
        .get(provider_name)
        .with_context(|| format!("unknown provider {provider_name}"))?;

    let request = GenerationRequest {
        prompt,
        input_images: cli.input_images,
        output_dir: cli.output_dir,
        model,
    };
    let mut pipeline = Pipeline::new(provider);
    let prepared = pipeline.prepare(&request)?;
    if cli.print_prompt {
        eprintln!("{}", prepared.request.prompt_text);
    }
    let outcome = pipeline.execute(prepared)?;

    let resolution = outcome
        .resolution
        .map(|resolution| resolution.to_string())
        .unwrap_or_else(|| "model default".to_string());
    tracing::info!(
        resolution = %resolution,
        hybrid = outcome.hybrid,
        warnings = outcome.warnings.len(),
        "image ready"
    );
    tracing::debug!(prompt = %outcome.prompt_text, "rendered prompt");
    if let Some(text) = outcome.model_text.as_deref() {
        eprintln!("model: {text}");
    }
    println!("{}", outcome.image_path.display());
    Ok(())
}
