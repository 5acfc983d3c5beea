use std::path::PathBuf;

use clap::Subcommand;
use timeanchor_core::AnchorConfig;

use super::{load_config, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default config file location
    Path,
    /// Write a default config file
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Show { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", AnchorConfig::path()?.display());
        }
        ConfigAction::Init { config, force } => {
            let path = match config {
                Some(path) => path,
                None => AnchorConfig::path()?,
            };
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            AnchorConfig::default().save_to(&path)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
