use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tilestitch_core::grouping::instances_of_attribute;
use tilestitch_core::io::ImageSource;
use tilestitch_core::view::Attribute;

use super::load_dataset;

#[derive(Args)]
pub struct InfoArgs {
    /// Dataset manifest (TOML)
    pub manifest: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let (dataset, source) = load_dataset(&args.manifest)?;

    println!("Manifest:    {}", args.manifest.display());
    println!("Views:       {}", dataset.views.len());
    for attribute in Attribute::ALL {
        let mut instances: Vec<_> = instances_of_attribute(&dataset.views, attribute)
            .into_iter()
            .collect();
        instances.sort();
        let labels: Vec<String> = instances.iter().map(|v| v.label()).collect();
        println!("{:<13}{} ({})", format!("{}:", attribute), labels.len(), labels.join(", "));
    }

    println!();
    for vd in &dataset.views {
        let id = vd.id();
        let translation = dataset.registrations.get(id)?.translation.clone();
        let size = source.size(id).unwrap_or_else(|| vd.size().to_vec());
        println!(
            "  {}  channel {}  tile {}  size {:?}  at {:?}",
            id,
            vd.setup.channel,
            vd.setup.tile,
            size,
            translation
        );
    }

    Ok(())
}
