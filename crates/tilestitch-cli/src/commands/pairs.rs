use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tilestitch_core::pipeline::plan_stitching;

use super::{load_config, load_dataset};
use crate::summary::print_plan_summary;

#[derive(Args)]
pub struct PairsArgs {
    /// Dataset manifest (TOML)
    pub manifest: PathBuf,

    /// Stitching config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum overlap fraction for a pair to be listed
    #[arg(long)]
    pub min_overlap: Option<f64>,
}

pub fn run(args: &PairsArgs) -> Result<()> {
    let (dataset, _) = load_dataset(&args.manifest)?;
    let mut config = load_config(args.config.as_deref())?;
    if let Some(fraction) = args.min_overlap {
        config.pair_selection.min_overlap_fraction = fraction;
    }

    let plan = plan_stitching(&config, &dataset)?;
    print_plan_summary(&config, &plan);

    for (a, b) in &plan.pairs {
        println!("  {}  <->  {}", a, b);
    }

    Ok(())
}
