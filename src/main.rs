mod inputs;

use anyhow::Context;
use clap::Parser;
use embr_summary::{
    OpenAiChatClient, SummaryConfig, SummaryError, SummaryInput, Summarizer, resolve_config,
};
use inputs::PatientFile;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BANNER_WIDTH: usize = 80;
const DEFAULT_PATIENT_DIR: &str = "patients";

#[derive(Parser)]
#[command(name = "embr-run")]
#[command(about = "Summarize patient records with a chat-completion model")]
struct Args {
    /// Patient files (.embr, .json, .yaml) or directories of them; defaults to EMBR_PATIENT_DIR
    paths: Vec<PathBuf>,
}

/// Summarize patient records with a chat-completion model.
///
/// Each summary is printed between banners. A failing file is logged and skipped, and the
/// process exits with an error if any file failed. A rejected API key stops the run.
///
/// # Environment Variables
/// - `OPENAI_API_KEY`: API key for the chat endpoint (required)
/// - `EMBR_MODEL`: model name (default: "gpt-4o-mini")
/// - `EMBR_API_BASE`: endpoint base URL (default: "https://api.openai.com/v1")
/// - `EMBR_TEMPERATURE`: sampling temperature (default: 0.7)
/// - `EMBR_MAX_TOKENS`: completion token limit (default: 5000)
/// - `EMBR_PATIENT_DIR`: directory scanned when no paths are given (default: "patients")
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("embr=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match config_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", setup_hint(&e));
            return Err(e).context("cannot configure summary client");
        }
    };
    tracing::info!(model = config.model(), base_url = config.base_url(), "summary client configured");

    let patient_dir = env_var("EMBR_PATIENT_DIR").unwrap_or_else(|| DEFAULT_PATIENT_DIR.into());
    let files = inputs::collect_inputs(&args.paths, Path::new(&patient_dir))?;
    if files.is_empty() {
        anyhow::bail!("no patient files found in {patient_dir}");
    }

    let client = OpenAiChatClient::new(&config)?;
    let summarizer = Summarizer::new(client, config);

    let mut failed = 0;
    for file in &files {
        match summarize_file(&summarizer, file) {
            Ok(summary) => println!("{}", render_banner(file, &summary)),
            Err(e) => {
                failed += 1;
                tracing::error!(file = %file.display(), "failed to summarize: {e:#}");
                let key_error = e
                    .downcast_ref::<SummaryError>()
                    .filter(|err| is_key_problem(err));
                if let Some(err) = key_error {
                    eprintln!("{}", setup_hint(err));
                    anyhow::bail!("API key rejected by the chat endpoint");
                }
            }
        }
    }

    tracing::info!(total = files.len(), failed, "finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} records could not be summarized", files.len());
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn config_from_env() -> Result<SummaryConfig, SummaryError> {
    resolve_config(
        env_var("OPENAI_API_KEY"),
        env_var("EMBR_MODEL"),
        env_var("EMBR_API_BASE"),
        env_var("EMBR_TEMPERATURE"),
        env_var("EMBR_MAX_TOKENS"),
    )
}

/// Missing key, or one the endpoint refused.
fn is_key_problem(error: &SummaryError) -> bool {
    matches!(
        error,
        SummaryError::MissingApiKey | SummaryError::Api { status: 401, .. }
    )
}

fn setup_hint(error: &SummaryError) -> String {
    if is_key_problem(error) {
        format!(
            "Error: {error}\n\n### Steps to Fix\n\
             ##### Copy .env.example to .env\n\
             ##### Add your OpenAI API key to the .env file as OPENAI_API_KEY=..."
        )
    } else {
        format!("Error: {error}")
    }
}

fn summary_input(file: &PatientFile) -> SummaryInput<'_> {
    match file {
        PatientFile::Encoded(text) => SummaryInput::Encoded(text),
        PatientFile::Record(record) => SummaryInput::Record(record),
    }
}

fn summarize_file(
    summarizer: &Summarizer<OpenAiChatClient>,
    file: &Path,
) -> anyhow::Result<String> {
    let patient = inputs::load(file)?;
    let summary = summarizer.summarize(summary_input(&patient))?;
    Ok(summary)
}

fn render_banner(file: &Path, summary: &str) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    format!(
        "\nPATIENT SUMMARY: {}\n{rule}\n{summary}\n{rule}",
        file.display()
    )
}
