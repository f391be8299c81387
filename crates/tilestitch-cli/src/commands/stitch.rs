use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tilestitch_core::io::{registration_entries, RegistrationEntry};
use tilestitch_core::pipeline::config::CombineStrategy;
use tilestitch_core::pipeline::{plan_stitching, run_stitching_reported, PipelineStage, ProgressReporter};
use tilestitch_core::solver::RelaxationSolver;

use super::{load_config, load_dataset, parse_list};
use crate::summary::{print_plan_summary, print_solution_summary};

#[derive(Args)]
pub struct StitchArgs {
    /// Dataset manifest (TOML)
    pub manifest: PathBuf,

    /// Stitching config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated per-axis downsampling, e.g. 2,2,1
    #[arg(long)]
    pub downsample: Option<String>,

    /// Minimum correlation for a pairwise shift to be kept
    #[arg(long)]
    pub min_correlation: Option<f64>,

    /// How grouped views are combined before correlation
    #[arg(long, value_enum)]
    pub combine: Option<CombineArg>,

    /// Output file for the optimized registrations (TOML)
    #[arg(short, long, default_value = "registrations.toml")]
    pub output: PathBuf,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum CombineArg {
    Representative,
    Average,
    Aggregate,
}

impl From<CombineArg> for CombineStrategy {
    fn from(arg: CombineArg) -> Self {
        match arg {
            CombineArg::Representative => Self::Representative,
            CombineArg::Average => Self::Average,
            CombineArg::Aggregate => Self::Aggregate,
        }
    }
}

/// Output file layout.
#[derive(Serialize)]
struct RegistrationFile {
    registrations: Vec<RegistrationEntry>,
}

/// Drives a progress bar from pipeline stage callbacks.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:30} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}

pub fn run(args: &StitchArgs) -> Result<()> {
    let (dataset, source) = load_dataset(&args.manifest)?;
    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref downsample) = args.downsample {
        config.downsample = parse_list(downsample)?;
    }
    if let Some(min_correlation) = args.min_correlation {
        config.pairwise.min_correlation = min_correlation;
    }
    if let Some(combine) = args.combine {
        config.combine = combine.into();
    }

    let plan = plan_stitching(&config, &dataset)?;
    print_plan_summary(&config, &plan);

    let reporter = BarReporter::new()?;
    let output = run_stitching_reported(&config, &dataset, &source, &RelaxationSolver::new(), &reporter)?;
    reporter.bar.finish_with_message("Done");

    print_solution_summary(&output);

    let file = RegistrationFile {
        registrations: registration_entries(&output.registrations),
    };
    let toml_str = toml::to_string_pretty(&file)?;
    std::fs::write(&args.output, toml_str)
        .with_context(|| format!("Failed to write registrations to {}", args.output.display()))?;
    println!("\nRegistrations saved to {}", args.output.display());

    Ok(())
}
