//! Config command

use anyhow::{Context, Result};
use camino::Utf8Path;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::commands::{load_config, loader};
use crate::output;

pub fn run(cmd: ConfigCommands, config_path: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config_path),
        ConfigCommands::Path => path(config_path),
    }
}

fn show(args: ConfigShowArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?.redacted();

    if args.json {
        let json = serde_json::to_string_pretty(&config).context("Failed to render JSON")?;
        println!("{}", json);
    } else {
        let yaml = serde_yaml_ng::to_string(&config).context("Failed to render YAML")?;
        print!("{}", yaml);
    }

    Ok(())
}

fn path(config_path: Option<&Utf8Path>) -> Result<()> {
    let loader = loader(config_path)?;
    let path = loader.config_path();

    println!("{}", path);
    if !path.exists() {
        output::warning("File does not exist; built-in defaults are in effect");
    }
    Ok(())
}
