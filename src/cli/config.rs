//! `garden config` handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use console::Style;
use dialoguer::Password;
use garden_core::config::{find_config_file, Config};
use garden_core::output::OutputFormatter;
use garden_core::Credential;

use crate::cli::ConfigCommand;

/// Where writes go: the explicit path, the file in use, or the default location
fn target_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    find_config_file()
        .or_else(Config::default_path)
        .context("Could not determine a configuration directory")
}

pub fn handle_config(
    cmd: Option<ConfigCommand>,
    config: &mut Config,
    explicit: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let green = Style::new().green();

    match cmd.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            formatter.print_config(config, config.resolve_credential().is_some());
        }

        ConfigCommand::Path => {
            let path = target_path(explicit)?;
            let note = if path.exists() { "" } else { " (not created yet)" };
            println!("{}{}", path.display(), note);
        }

        ConfigCommand::SetKey => {
            let key = Password::new()
                .with_prompt("Mistral API key")
                .interact()
                .context("Failed to read API key")?;
            if Credential::new(key.as_str()).is_none() {
                bail!("The API key cannot be empty");
            }

            let path = target_path(explicit)?;
            let mut stored = if path.exists() {
                Config::load(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?
            } else {
                Config::default()
            };
            stored.provider.api_key = Some(key.trim().to_string());
            stored
                .save(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            config.provider.api_key = stored.provider.api_key.clone();

            println!(
                "{} {}",
                green.apply_to("API key saved to"),
                path.display()
            );
        }

        ConfigCommand::Init { force } => {
            let path = target_path(explicit)?;
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", green.apply_to("Wrote default config to"), path.display());
        }
    }

    Ok(())
}
