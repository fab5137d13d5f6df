use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};

use cardshot::export::{card_basename, plan_card};
use cardshot::rendering::split_cards;
use cardshot::software::{SoftwareRasterizer, SoftwareTarget};
use cardshot::{ExportArtifact, ExportConfig, ExportFormat, Exporter, SplitMode};

#[derive(Parser)]
#[command(name = "cardshot", version, about = "Export rendered note cards as sliced images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every card of a note and write one image or zip per card
    Export {
        input: PathBuf,
        #[arg(long, default_value = "exports")]
        out: PathBuf,
        #[command(flatten)]
        opts: ExportOpts,
        #[arg(long, value_enum, default_value_t = Backend::Software)]
        backend: Backend,
    },
    /// Print the slice plan of every card as JSON
    Plan {
        input: PathBuf,
        #[command(flatten)]
        opts: ExportOpts,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Software,
    Cdp,
}

#[derive(clap::Args)]
struct ExportOpts {
    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// fixed, hr or auto
    #[arg(long)]
    mode: Option<SplitMode>,
    #[arg(long)]
    height: Option<f64>,
    #[arg(long)]
    overlap: Option<f64>,
    /// png, jpeg or svg
    #[arg(long)]
    format: Option<ExportFormat>,
    #[arg(long)]
    scale: Option<f64>,
    /// Only this card (1-based)
    #[arg(long)]
    card: Option<usize>,
}

impl ExportOpts {
    fn load_config(&self) -> anyhow::Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_json_file(path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?,
            None => ExportConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.split.mode = mode;
        }
        if let Some(height) = self.height {
            config.split.height = height;
        }
        if let Some(overlap) = self.overlap {
            config.split.overlap = overlap;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        config.validate()?;
        Ok(config)
    }

    /// Cards to process as (0-based index, html)
    fn select_cards(&self, html: &str) -> anyhow::Result<Vec<(usize, String)>> {
        let cards: Vec<(usize, String)> = split_cards(html).into_iter().enumerate().collect();
        if cards.is_empty() {
            bail!("the note has no content to export");
        }
        match self.card {
            None => Ok(cards),
            Some(n) if n >= 1 && n <= cards.len() => Ok(vec![cards[n - 1].clone()]),
            Some(n) => bail!("card {} does not exist (the note has {} card(s))", n, cards.len()),
        }
    }
}

fn note_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "note".to_string())
}

fn report(artifact: &ExportArtifact, path: &Path) {
    println!(
        "{}  {} bytes  sha256:{}",
        path.display(),
        artifact.data().len(),
        artifact.sha256_hex()
    );
    if artifact.is_archive() {
        for entry in artifact.entries() {
            println!("  {}", entry);
        }
    }
}

async fn export(input: &Path, out: &Path, opts: &ExportOpts, backend: Backend) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let exporter = Exporter::new(opts.load_config()?)?;
    let stem = note_stem(input);

    for (index, card) in opts.select_cards(&html)? {
        let base = card_basename(&stem, index);
        let artifact = match backend {
            Backend::Software => {
                let mut target = SoftwareTarget::from_html(&card, exporter.config())?;
                exporter.export(&mut target, &SoftwareRasterizer, &base).await?
            }
            #[cfg(feature = "cdp")]
            Backend::Cdp => {
                let mut target = cardshot::cdp::CdpTarget::from_html(&card, exporter.config())?;
                exporter.export(&mut target, &cardshot::cdp::CdpRasterizer, &base).await?
            }
            #[cfg(not(feature = "cdp"))]
            Backend::Cdp => bail!("this build does not include the cdp backend (rebuild with --features cdp)"),
        };
        let path = artifact.write_to(out)?;
        report(&artifact, &path);
    }
    Ok(())
}

fn plan(input: &Path, opts: &ExportOpts) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let config = opts.load_config()?;
    let stem = note_stem(input);

    let mut plans = Vec::new();
    for (index, card) in opts.select_cards(&html)? {
        let target = SoftwareTarget::from_html(&card, &config)?;
        let positions = plan_card(&target, &config)?;
        plans.push(serde_json::json!({
            "card": card_basename(&stem, index),
            "mode": config.split.mode,
            "total_height": target.layout().height,
            "slices": positions,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Export { input, out, opts, backend } => export(input, out, opts, *backend).await,
        Command::Plan { input, opts } => plan(input, opts),
    };
    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
