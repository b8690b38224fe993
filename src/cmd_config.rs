//! Configuration subcommands.

use std::path::Path;

use anyhow::{Context, Result, bail};

use webrefactor_config::{Config, ConfigValidator, Settings};

use crate::App;
use crate::cli::ConfigAction;

pub(crate) async fn handle(
    action: ConfigAction,
    config: Config,
    data_dir: &Path,
    config_path: &Path,
) -> Result<()> {
    match action {
        ConfigAction::Check => check(&config, config_path),
        ConfigAction::Show => {
            let app = App::new(config, data_dir).await?;
            let settings = app
                .controller
                .settings()
                .load()
                .await
                .context("failed to read settings")?;
            println!("{}", serde_json::to_string_pretty(&masked(settings))?);
            Ok(())
        }
        ConfigAction::Apply => {
            let settings = config.settings.clone();
            let app = App::new(config, data_dir).await?;
            app.controller
                .settings()
                .save(&settings)
                .await
                .context("failed to save settings")?;
            println!("Stored settings replaced from {}.", config_path.display());
            Ok(())
        }
        ConfigAction::AutoRefactor { state } => {
            let app = App::new(config, data_dir).await?;
            let enabled = state == "on";
            app.controller
                .settings()
                .set_auto_refactor(enabled)
                .await
                .context("failed to save settings")?;
            println!("Auto refactor {state}.");
            Ok(())
        }
    }
}

fn check(config: &Config, config_path: &Path) -> Result<()> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        bail!(
            "{} has {} error(s)",
            config_path.display(),
            result.errors.len()
        );
    }
    println!("{} is valid.", config_path.display());
    Ok(())
}

fn masked(mut settings: Settings) -> Settings {
    let key = settings.api_key.trim();
    if !key.is_empty() {
        let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        settings.api_key = format!("****{tail}");
    }
    settings
}
