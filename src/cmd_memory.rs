//! Domain memory subcommands.

use anyhow::{Context, Result, anyhow};
use tracing::info;

use webrefactor_runtime::memory_hostname;

use crate::cli::MemoryAction;
use crate::{App, report, summarize};

pub(crate) async fn handle(action: MemoryAction, app: &App) -> Result<()> {
    match action {
        MemoryAction::Save {
            page,
            prompt,
            output,
        } => crate::refactor(app, &page, &prompt, output.as_deref(), true).await,
        MemoryAction::Apply {
            page,
            domain,
            output,
        } => apply(app, &page, domain, output.as_deref()).await,
        MemoryAction::Show { domain } => show(app, &domain).await,
        MemoryAction::History { domain, format } => history(app, &domain, &format).await,
        MemoryAction::Forget { domain } => forget(app, &domain).await,
        MemoryAction::List => list(app).await,
    }
}

async fn apply(
    app: &App,
    page: &str,
    domain: Option<String>,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let (tab, loaded) = app.open(page).await?;
    let hostname = match domain {
        Some(domain) => domain,
        None => memory_hostname(&loaded.url)
            .ok_or_else(|| anyhow!("{} has no hostname; pass --domain", loaded.url))?,
    };

    let result = app.controller.apply_memory(tab, &hostname).await;
    let applied = match result {
        Ok(applied) => applied,
        Err(e) => {
            app.close(tab);
            return Err(report(e));
        }
    };
    summarize(&applied.outcome);
    info!(domain = %applied.hostname, source = ?applied.source, "Applied domain memory");

    app.write_tab(tab, output).await?;
    app.close(tab);
    Ok(())
}

async fn show(app: &App, domain: &str) -> Result<()> {
    let domain = domain.trim().to_ascii_lowercase();
    match app
        .controller
        .memory()
        .load_domain_config(&domain)
        .await
        .context("failed to read domain memory")?
    {
        Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
        None => println!("No memory for {domain}."),
    }
    Ok(())
}

async fn history(app: &App, domain: &str, format: &str) -> Result<()> {
    let domain = domain.trim().to_ascii_lowercase();
    let entries = app
        .controller
        .memory()
        .load_domain_memory_history(&domain)
        .await
        .context("failed to read memory history")?;

    if entries.is_empty() {
        println!("No history for {domain}.");
        return Ok(());
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            println!("{:<26} {:<9} {}", "SAVED", "COMMANDS", "PROMPT");
            println!("{}", "-".repeat(80));
            for entry in entries {
                println!(
                    "{:<26} {:<9} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                    entry.commands.len(),
                    entry.prompt
                );
            }
        }
    }
    Ok(())
}

async fn forget(app: &App, domain: &str) -> Result<()> {
    let domain = domain.trim().to_ascii_lowercase();
    let existed = app
        .controller
        .memory()
        .forget_domain(&domain)
        .await
        .context("failed to delete domain memory")?;
    if existed {
        println!("Forgot {domain}.");
    } else {
        println!("No memory for {domain}.");
    }
    Ok(())
}

async fn list(app: &App) -> Result<()> {
    let domains = app
        .controller
        .memory()
        .domains()
        .await
        .context("failed to list domain memory")?;
    if domains.is_empty() {
        println!("No domain memory saved.");
    }
    for domain in domains {
        println!("{domain}");
    }
    Ok(())
}
