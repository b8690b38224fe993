//! WebRefactor - LLM-driven page refactoring.
//!
//! Main entry point for the WebRefactor CLI.

mod cli;
mod cmd_config;
mod cmd_memory;
mod page;
mod providers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use webrefactor_agent::{AgentSettings, LocalBrowser};
use webrefactor_bus::MessageBus;
use webrefactor_config::{Config, ConfigLoader, ConfigValidator};
use webrefactor_protocols::{RefactorError, TabId};
use webrefactor_runtime::{Controller, ProviderFactory, RefactorOutcome};
use webrefactor_storage_json::JsonFileStore;

use cli::{Cli, Commands};
use page::{LoadedPage, load_page, write_document};

/// Initialize tracing with console and file output.
///
/// Log files are written to `<data dir>/logs/` with daily rotation. The
/// console layer writes to stderr so documents on stdout stay clean.
fn init_tracing(data_dir: &Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("webrefactor")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Everything one CLI invocation works with.
pub(crate) struct App {
    pub config: Config,
    pub browser: Arc<LocalBrowser>,
    pub controller: Arc<Controller>,
    pub http: reqwest::Client,
}

impl App {
    async fn new(config: Config, data_dir: &Path) -> Result<Self> {
        let validation = ConfigValidator::ensure_valid(&config).context("invalid configuration")?;
        for issue in &validation.warnings {
            warn!(path = %issue.path, "{}", issue.message);
        }

        let store = Arc::new(
            JsonFileStore::open(data_dir.join("storage"))
                .await
                .context("failed to open storage")?,
        );

        let bus = Arc::new(MessageBus::new());
        let agent_settings = AgentSettings {
            sub_batch_size: config.pipeline.sub_batch_size,
            sub_batch_yield: config.pipeline.sub_batch_yield(),
            thresholds: config.detector.clone(),
            protected_substrings: config.protection.protected_substrings.clone(),
        };
        let browser = Arc::new(LocalBrowser::new(bus.clone(), agent_settings));

        let factory: Arc<dyn ProviderFactory> = Arc::new(providers::build_provider);
        let controller = Controller::new(browser.clone(), bus, store, factory)
            .with_pipeline(config.pipeline.clone())
            .with_default_settings(config.settings.clone());

        let seeded = controller
            .settings()
            .seed()
            .await
            .context("failed to seed settings")?;
        if seeded > 0 {
            info!(seeded, "Seeded settings from configuration");
        }

        Ok(Self {
            config,
            browser,
            controller: Arc::new(controller),
            http: reqwest::Client::new(),
        })
    }

    /// Load a page into a fresh tab.
    pub async fn open(&self, page: &str) -> Result<(TabId, LoadedPage)> {
        let loaded = load_page(page, &self.http).await?;
        let tab = self.browser.open_tab(&loaded.url, &loaded.markup);
        Ok((tab, loaded))
    }

    pub async fn write_tab(&self, tab: TabId, output: Option<&Path>) -> Result<()> {
        let markup = self.browser.document_html(tab)?;
        write_document(&markup, output).await
    }

    pub fn close(&self, tab: TabId) {
        self.controller.on_tab_closed(tab);
        if let Err(e) = self.browser.close_tab(tab) {
            warn!(%tab, error = %e, "Failed to close tab");
        }
    }
}

/// Log and convert a pipeline error for the top level.
pub(crate) fn report(err: RefactorError) -> anyhow::Error {
    error!(kind = %err.kind(), "{err}");
    anyhow!(err.user_message())
}

pub(crate) fn summarize(outcome: &RefactorOutcome) {
    let failed = outcome.report.failed().count();
    info!(
        url = %outcome.url,
        commands = outcome.commands.len(),
        failed,
        rejected = outcome.rejections.len(),
        skipped_protected = outcome.report.skipped_protected,
        attempts = outcome.attempts,
        "Refactor applied"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let data_dir: PathBuf = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.resolved_dir());
    init_tracing(&data_dir)?;

    match cli.command {
        Commands::Config { action } => cmd_config::handle(action, config, &data_dir, &cli.config).await,
        Commands::Refactor {
            page,
            prompt,
            output,
            save,
        } => {
            let app = App::new(config, &data_dir).await?;
            refactor(&app, &page, &prompt, output.as_deref(), save).await
        }
        Commands::Replay { page, output } => {
            let app = App::new(config, &data_dir).await?;
            replay(&app, &page, output.as_deref()).await
        }
        Commands::Memory { action } => {
            let app = App::new(config, &data_dir).await?;
            cmd_memory::handle(action, &app).await
        }
        Commands::TestConnection => {
            let app = App::new(config, &data_dir).await?;
            let reply = app.controller.test_connection(None).await.map_err(report)?;
            println!("Connection OK: {}", reply.trim());
            Ok(())
        }
    }
}

/// Run one refactor and write the result.
pub(crate) async fn refactor(
    app: &App,
    page: &str,
    prompt: &str,
    output: Option<&Path>,
    save: bool,
) -> Result<()> {
    let (tab, _) = app.open(page).await?;
    let result = app.controller.refactor(tab, prompt).await;
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            app.close(tab);
            return Err(report(e));
        }
    };
    summarize(&outcome);

    if save {
        let entry = app
            .controller
            .save_domain_memory_with_commands(tab, Some(prompt))
            .await
            .map_err(report)?;
        info!(domain = %entry.domain, commands = entry.commands.len(), "Saved to domain memory");
    }

    app.write_tab(tab, output).await?;
    app.close(tab);
    Ok(())
}

/// Load a page and let automatic replay run if it applies.
async fn replay(app: &App, page: &str, output: Option<&Path>) -> Result<()> {
    let (tab, loaded) = app.open(page).await?;
    match app.controller.on_tab_loaded(tab, &loaded.url).await {
        Some(handle) => {
            let applied = handle
                .await
                .context("replay task failed")?
                .map_err(report)?;
            summarize(&applied.outcome);
            info!(domain = %applied.hostname, source = ?applied.source, "Replayed domain memory");
        }
        None => info!(url = %loaded.url, "Nothing to replay (auto-refactor off or no memory)"),
    }
    app.write_tab(tab, output).await?;
    app.close(tab);
    Ok(())
}
