use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use crispex_rs::{design_guides_from_files, DesignConfig, GenomicRegion};

#[derive(Parser)]
#[command(name = "crispex-rs")]
#[command(version)]
#[command(about = "Design and rank CRISPR guide RNAs for a target sequence")]
struct Args {
    /// Target FASTA (plain or .gz); the first record is used unless --region is given
    target: PathBuf,

    /// Reference FASTA searched for off-targets (defaults to the target itself)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Region of the target to design for, e.g. chr17:7661779-7687550
    #[arg(long)]
    region: Option<GenomicRegion>,

    /// JSON design configuration; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the ranked guides here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn spinner(colour: &str, message: &'static str) -> Result<ProgressBar, Box<dyn Error>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{colour}}} {{msg}} {{pos}}"))?,
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    // 1. Configuration
    let config = match &args.config {
        Some(path) => DesignConfig::from_json_file(path)?,
        None => DesignConfig::default(),
    };

    // 2. Design
    let bar = spinner("green", "Profiling candidates...")?;
    let report = design_guides_from_files(
        &args.target,
        args.reference.as_deref(),
        args.region.as_ref(),
        config,
        &|| bar.inc(1),
    )?;
    bar.finish_with_message(format!(
        "Ranked {} guide(s) from {} candidate(s).",
        report.guides.len(),
        report.candidates_extracted
    ));

    for failure in &report.failures {
        eprintln!("skipped {} ({}): {}", failure.candidate, failure.stage, failure.message);
    }

    // 3. Output
    match &args.output {
        Some(path) => {
            let bar = spinner("yellow", "Writing guides...")?;
            std::fs::write(path, report.guides_tsv())?;
            bar.finish_with_message(format!("Guides written to {}.", path.display()));
        }
        None => print!("{}", report.guides_tsv()),
    }
    Ok(())
}
