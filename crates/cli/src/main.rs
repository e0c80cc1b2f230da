use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use embr::{structured, ClinicalRecord, EntityDetail, EntityKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "embr")]
#[command(about = "Convert, validate and inspect EMBR patient records")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON or YAML record as EMBR
    Encode {
        /// Structured record to read
        input: PathBuf,
        /// Input format (defaults from the file extension)
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode an EMBR file into JSON or YAML
    Decode {
        /// EMBR file to read
        input: PathBuf,
        /// Output format (defaults from the output extension, else JSON)
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that EMBR files decode cleanly
    Validate {
        /// EMBR files to check
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Show entity counts for an EMBR file
    Stats {
        /// EMBR file to inspect
        input: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    /// `.yaml`/`.yml` mean YAML; anything else is JSON.
    fn from_path(path: Option<&Path>) -> Self {
        match path
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn encode_file(input: &Path, format: Option<Format>) -> anyhow::Result<String> {
    let text = read_text(input)?;
    let record = match format.unwrap_or_else(|| Format::from_path(Some(input))) {
        Format::Json => structured::parse_json(&text),
        Format::Yaml => structured::parse_yaml(&text),
    }
    .with_context(|| format!("failed to read record from {}", input.display()))?;

    let text =
        embr::encode(&record).with_context(|| format!("cannot encode {}", input.display()))?;
    tracing::info!(
        input = %input.display(),
        entities = record.entities.len(),
        bytes = text.len(),
        "encoded record"
    );
    Ok(text)
}

fn decode_file(
    input: &Path,
    format: Option<Format>,
    output: Option<&Path>,
) -> anyhow::Result<String> {
    let record = decode_path(input)?;
    let rendered = match format.unwrap_or_else(|| Format::from_path(output)) {
        Format::Json => structured::render_json(&record),
        Format::Yaml => structured::render_yaml(&record),
    }?;
    Ok(rendered)
}

fn decode_path(input: &Path) -> anyhow::Result<ClinicalRecord> {
    let text = read_text(input)?;
    embr::decode(&text).with_context(|| format!("invalid EMBR in {}", input.display()))
}

/// Returns the number of files that failed.
fn validate_files(inputs: &[PathBuf]) -> usize {
    let mut failures = 0;
    for input in inputs {
        match decode_path(input) {
            Ok(record) => {
                tracing::info!(input = %input.display(), entities = record.entities.len(), "valid");
                println!(
                    "OK    {} ({} entities)",
                    input.display(),
                    record.entities.len()
                );
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(input = %input.display(), "validation failed: {e:#}");
                println!("ERROR {}: {:#}", input.display(), e);
            }
        }
    }
    failures
}

fn stats_report(input: &Path) -> anyhow::Result<String> {
    let text = read_text(input)?;
    let record =
        embr::decode(&text).with_context(|| format!("invalid EMBR in {}", input.display()))?;

    let mut lines = vec![format!("{}: {} bytes", input.display(), text.len())];
    for kind in EntityKind::ALL {
        let count = record.entities_of(kind).count();
        if count > 0 {
            lines.push(format!("  {:<18} {count}", kind.section_name()));
        }
    }
    let goals: usize = record
        .entities_of(EntityKind::CarePlan)
        .map(|plan| match &plan.detail {
            EntityDetail::CarePlan { goals } => goals.len(),
            _ => 0,
        })
        .sum();
    if goals > 0 {
        lines.push(format!("  {:<18} {goals}", "Goals"));
    }
    lines.push(format!("  {:<18} {}", "Total", record.entities.len()));
    Ok(lines.join("\n"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "embr=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Encode {
            input,
            format,
            output,
        }) => {
            let text = encode_file(&input, format)?;
            write_output(output.as_deref(), &text)?;
        }
        Some(Commands::Decode {
            input,
            format,
            output,
        }) => {
            let mut text = decode_file(&input, format, output.as_deref())?;
            if !text.ends_with('\n') {
                text.push('\n');
            }
            write_output(output.as_deref(), &text)?;
        }
        Some(Commands::Validate { inputs }) => {
            let failures = validate_files(&inputs);
            if failures > 0 {
                anyhow::bail!("{failures} of {} files failed validation", inputs.len());
            }
        }
        Some(Commands::Stats { input }) => {
            println!("{}", stats_report(&input)?);
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
