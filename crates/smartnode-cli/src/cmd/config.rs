use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use smartnode_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print config.yml merged with settings.yml
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(dir: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(dir).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
