//! The Controller: drives a refactor end to end.
//!
//! One refactor is: check the URL, make sure an agent answers in the
//! tab, extract a summary and snapshot, then run a bounded attempt loop
//! of prompt → parse → execute. A white page inside the budget turns
//! into a reset plus a retry prompt; anything else ends the run.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use webrefactor_config::{PipelineConfig, Settings};
use webrefactor_core::{ParseError, ParsedBatch, Rejection, ResponseParser, SafetyGate, schema};
use webrefactor_protocols::memory::{domain_config_key, history_key};
use webrefactor_protocols::message::{AgentFailure, ExecutionReport};
use webrefactor_protocols::page::PageSummary;
use webrefactor_protocols::{
    AgentError, AgentReply, AgentRequest, DamageSignature, DomainMemoryEntry, HistoryEntry,
    HostError, KeyValueStore, LLMProvider, MutationCommand, PageChannel, ProviderError,
    RefactorError, RetryContext, RollbackOutcome, TabHost, TabId,
};

use crate::llm::{ExchangeLog, LlmClient};
use crate::memory::{DomainMemoryStore, RetentionPolicy, memory_hostname};
use crate::settings::SettingsStore;
use crate::tabs::{LastBatch, TabStates};

/// Schemes a refactor may run on.
pub const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// `Ok` when the page's scheme allows refactoring.
pub fn check_page_url(url: &str) -> Result<(), RefactorError> {
    let scheme = match Url::parse(url) {
        Ok(parsed) => parsed.scheme().to_string(),
        Err(_) => url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default(),
    };
    if SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
        Ok(())
    } else {
        Err(RefactorError::UnsupportedPage {
            url: url.to_string(),
            scheme,
        })
    }
}

/// Re-check commands that did not come straight from the parser.
/// Returns the admissible commands and how many were dropped.
pub fn admissible(commands: Vec<MutationCommand>) -> (Vec<MutationCommand>, usize) {
    let total = commands.len();
    let kept: Vec<MutationCommand> = commands
        .into_iter()
        .filter(|cmd| match schema::validate_command(cmd) {
            Err(violation) => {
                warn!(selector = %cmd.selector, %violation, "Stored command fails validation");
                false
            }
            Ok(()) => match SafetyGate::check(&cmd.selector) {
                Err(rule) => {
                    warn!(selector = %cmd.selector, %rule, "Stored command blocked by safety gate");
                    false
                }
                Ok(()) => true,
            },
        })
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Builds the LLM transport for the current settings.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &Settings) -> Result<Arc<dyn LLMProvider>, ProviderError>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&Settings) -> Result<Arc<dyn LLMProvider>, ProviderError> + Send + Sync,
{
    fn create(&self, settings: &Settings) -> Result<Arc<dyn LLMProvider>, ProviderError> {
        self(settings)
    }
}

/// A refactor that left the page intact.
#[derive(Debug, Clone)]
pub struct RefactorOutcome {
    pub tab: TabId,
    pub url: String,
    /// The batch that was executed.
    pub commands: Vec<MutationCommand>,
    pub report: ExecutionReport,
    /// 1-based attempt that succeeded.
    pub attempts: u32,
    /// Actions the parser refused in the successful attempt.
    pub rejections: Vec<Rejection>,
}

/// Where a replayed batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaySource {
    /// The entry's stored commands, no LLM call.
    StoredCommands,
    /// Regenerated from the stored prompt; the entry was upgraded.
    Prompt,
}

#[derive(Debug, Clone)]
pub struct MemoryApplied {
    pub hostname: String,
    pub source: ReplaySource,
    /// The entry as stored after the replay.
    pub entry: DomainMemoryEntry,
    pub outcome: RefactorOutcome,
}

/// One operation's view of a tab.
struct PageRun {
    tab: TabId,
    url: String,
    generation: u64,
}

enum Execution {
    Applied(ExecutionReport),
    WhitePage(DamageSignature),
}

pub struct Controller {
    host: Arc<dyn TabHost>,
    channel: Arc<dyn PageChannel>,
    providers: Arc<dyn ProviderFactory>,
    store: Arc<dyn KeyValueStore>,
    settings: SettingsStore,
    memory: DomainMemoryStore,
    pipeline: PipelineConfig,
    tabs: TabStates,
    parser: ResponseParser,
}

impl Controller {
    pub fn new(
        host: Arc<dyn TabHost>,
        channel: Arc<dyn PageChannel>,
        store: Arc<dyn KeyValueStore>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            host,
            channel,
            providers,
            settings: SettingsStore::new(store.clone(), Settings::default()),
            memory: DomainMemoryStore::new(store.clone()),
            store,
            tabs: TabStates::new(pipeline.last_batch_ttl()),
            pipeline,
            parser: ResponseParser::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.tabs = TabStates::new(pipeline.last_batch_ttl());
        self.pipeline = pipeline;
        self
    }

    /// Settings used for keys the synchronized namespace does not hold.
    pub fn with_default_settings(mut self, settings: Settings) -> Self {
        self.settings = SettingsStore::new(self.store.clone(), settings);
        self
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn memory(&self) -> &DomainMemoryStore {
        &self.memory
    }

    pub fn tabs(&self) -> &TabStates {
        &self.tabs
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    // ── User-visible operations ─────────────────────────────────────────

    /// Run the pipeline once for `prompt`.
    pub async fn refactor(&self, tab: TabId, prompt: &str) -> Result<RefactorOutcome, RefactorError> {
        let _guard = self.tabs.lock(tab).await;
        let run = self.begin(tab).await?;
        info!(%tab, url = %run.url, "Starting refactor");

        let result = async {
            let summary = self.prepare(&run).await?;
            let client = self.client().await?;
            self.attempt_loop(&run, &client, &summary, prompt).await
        }
        .await;

        match &result {
            Ok(outcome) => info!(
                %tab,
                commands = outcome.commands.len(),
                attempts = outcome.attempts,
                "Refactor succeeded"
            ),
            Err(e) => warn!(%tab, kind = %e.kind(), error = %e, "Refactor failed"),
        }
        result
    }

    /// Restore the tab from its snapshot. Returns whether the agent had
    /// to fall back to its own copy.
    pub async fn reset(&self, tab: TabId) -> Result<bool, RefactorError> {
        let _guard = self.tabs.lock(tab).await;
        let generation = self.tabs.generation(tab);
        let url = self.tab_url(tab).await?;
        let run = PageRun {
            tab,
            url,
            generation,
        };

        if self.tabs.snapshot(tab).is_none() && !self.probe(&run).await {
            return Err(RefactorError::NoOriginalState(tab));
        }
        self.ensure_agent(&run).await?;
        let used_fallback = self.restore(&run).await?;
        self.tabs.clear_snapshot(tab, run.generation);
        info!(%tab, used_fallback, "Page reset");
        Ok(used_fallback)
    }

    /// Persist the tab's last successful batch as the memory for its
    /// hostname. `prompt` overrides the prompt that produced the batch.
    pub async fn save_domain_memory_with_commands(
        &self,
        tab: TabId,
        prompt: Option<&str>,
    ) -> Result<DomainMemoryEntry, RefactorError> {
        let last = self
            .tabs
            .last_batch(tab)
            .ok_or(RefactorError::NoRecentRefactor(tab))?;
        let url = self.tab_url(tab).await?;
        let hostname = memory_hostname(&url).ok_or_else(|| RefactorError::UnsupportedPage {
            url: url.clone(),
            scheme: url.split_once(':').map(|(s, _)| s.to_string()).unwrap_or_default(),
        })?;
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&last.prompt)
            .to_string();

        let entry = DomainMemoryEntry::with_commands(&hostname, prompt, url, last.commands);
        self.memory
            .save_domain_config(&entry)
            .await
            .map_err(|e| RefactorError::storage(domain_config_key(&hostname), e))?;

        let settings = self.load_settings().await?;
        self.memory
            .append_history(
                &hostname,
                HistoryEntry::from(&entry),
                RetentionPolicy::from(&settings),
            )
            .await
            .map_err(|e| RefactorError::storage(history_key(&hostname), e))?;

        info!(%tab, hostname, commands = entry.commands.len(), "Saved domain memory with commands");
        Ok(entry)
    }

    /// Replay the memory stored for `hostname` in `tab`.
    pub async fn apply_memory(&self, tab: TabId, hostname: &str) -> Result<MemoryApplied, RefactorError> {
        let hostname = hostname.trim().to_ascii_lowercase();
        let entry = self
            .memory
            .load_domain_config(&hostname)
            .await
            .map_err(|e| RefactorError::storage(domain_config_key(&hostname), e))?
            .ok_or_else(|| RefactorError::NoDomainMemory(hostname.clone()))?;

        let _guard = self.tabs.lock(tab).await;
        let run = self.begin(tab).await?;
        self.apply_entry(&run, hostname, entry).await
    }

    /// Send a trivial message with `settings` (or the stored ones).
    pub async fn test_connection(&self, settings: Option<Settings>) -> Result<String, RefactorError> {
        let settings = match settings {
            Some(s) => s,
            None => self.load_settings().await?,
        };
        let client = self.client_for(&settings)?;
        let reply = client
            .test_connection()
            .await
            .map_err(|source| RefactorError::LLMTransportFailure {
                provider: settings.provider.to_string(),
                source,
            })?;
        info!(provider = %settings.provider, "Connection test succeeded");
        Ok(reply)
    }

    // ── Tab lifecycle ───────────────────────────────────────────────────

    /// A page finished loading. When auto-refactor is on and the hostname
    /// has a memory entry, schedules a replay after the settle delay.
    pub async fn on_tab_loaded(
        self: &Arc<Self>,
        tab: TabId,
        url: &str,
    ) -> Option<JoinHandle<Result<MemoryApplied, RefactorError>>> {
        let generation = self.tabs.page_loaded(tab);
        check_page_url(url).ok()?;

        match self.settings.auto_refactor_enabled().await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(%tab, error = %e, "Could not read auto-refactor setting");
                return None;
            }
        }

        let hostname = memory_hostname(url)?;
        let entry = match self.memory.load_domain_config(&hostname).await {
            Ok(Some(entry)) if entry.has_commands() || !entry.prompt.trim().is_empty() => entry,
            Ok(_) => return None,
            Err(e) => {
                warn!(%tab, hostname, error = %e, "Could not read domain memory");
                return None;
            }
        };

        info!(%tab, hostname, "Scheduling automatic replay");
        let controller = Arc::clone(self);
        let settle = self.pipeline.replay_settle();
        Some(tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let _guard = controller.tabs.lock(tab).await;
            let run = controller.begin(tab).await?;
            if run.generation != generation {
                debug!(%tab, "Page changed before replay");
                return Err(RefactorError::TabClosed(tab));
            }
            let result = controller.apply_entry(&run, hostname, entry).await;
            if let Err(e) = &result {
                warn!(%tab, "Automatic replay failed: {}", e.user_message());
            }
            result
        }))
    }

    /// Forget everything held for a closed tab. Work still in flight for
    /// it ends with [`RefactorError::TabClosed`].
    pub fn on_tab_closed(&self, tab: TabId) {
        self.tabs.close(tab);
    }

    // ── Pipeline steps ──────────────────────────────────────────────────

    async fn begin(&self, tab: TabId) -> Result<PageRun, RefactorError> {
        let generation = self.tabs.generation(tab);
        let url = self.tab_url(tab).await?;
        check_page_url(&url)?;
        Ok(PageRun {
            tab,
            url,
            generation,
        })
    }

    async fn tab_url(&self, tab: TabId) -> Result<String, RefactorError> {
        self.host.tab_url(tab).await.map_err(|e| match e {
            HostError::TabNotFound(tab) => RefactorError::TabClosed(tab),
            other => RefactorError::AgentUnavailable {
                url: String::new(),
                reason: other.to_string(),
            },
        })
    }

    fn ensure_current(&self, run: &PageRun) -> Result<(), RefactorError> {
        if self.tabs.is_current(run.tab, run.generation) {
            Ok(())
        } else {
            Err(RefactorError::TabClosed(run.tab))
        }
    }

    /// Agent live, summary extracted, snapshot retained.
    async fn prepare(&self, run: &PageRun) -> Result<PageSummary, RefactorError> {
        self.ensure_agent(run).await?;
        match self.request(run, AgentRequest::ExtractContent).await? {
            Ok(AgentReply::Extracted { summary, snapshot }) => {
                debug!(
                    tab = %run.tab,
                    ads = summary.advertisements.len(),
                    interactive = summary.interactive_total,
                    "Extracted page summary"
                );
                self.tabs.set_snapshot(run.tab, run.generation, snapshot);
                Ok(summary)
            }
            Ok(other) => Err(unexpected(run, "extractContent", &other)),
            Err(failure) => Err(agent_failure(run, failure)),
        }
    }

    async fn probe(&self, run: &PageRun) -> bool {
        match self
            .channel
            .request(run.tab, AgentRequest::Ping, self.pipeline.probe_timeout())
            .await
        {
            Ok(response) => matches!(response.into_result(), Ok(AgentReply::Pong)),
            Err(e) => {
                debug!(tab = %run.tab, error = %e, "Probe failed");
                false
            }
        }
    }

    async fn ensure_agent(&self, run: &PageRun) -> Result<(), RefactorError> {
        if self.probe(run).await {
            return Ok(());
        }

        let attempts = self.pipeline.inject_attempts.max(1);
        for attempt in 1..=attempts {
            debug!(tab = %run.tab, attempt, "Injecting page agent");
            self.host.inject_agent(run.tab).await.map_err(|e| match e {
                HostError::TabNotFound(tab) => RefactorError::TabClosed(tab),
                HostError::InjectionRefused { url, reason } => {
                    RefactorError::AgentUnavailable { url, reason }
                }
                HostError::Load(reason) => RefactorError::AgentUnavailable {
                    url: run.url.clone(),
                    reason,
                },
            })?;
            if self.probe(run).await {
                info!(tab = %run.tab, attempt, "Page agent ready");
                return Ok(());
            }
            tokio::time::sleep(self.pipeline.inject_settle()).await;
            self.ensure_current(run)?;
        }

        Err(RefactorError::AgentUnavailable {
            url: run.url.clone(),
            reason: format!("no answer to ping after {attempts} injection attempt(s)"),
        })
    }

    /// Send a request. The outer error is a transport or lifecycle
    /// failure; the inner one is the agent's `success: false`.
    async fn request(
        &self,
        run: &PageRun,
        request: AgentRequest,
    ) -> Result<Result<AgentReply, AgentFailure>, RefactorError> {
        let response = self
            .channel
            .request(run.tab, request, self.pipeline.request_timeout())
            .await;
        self.ensure_current(run)?;
        match response {
            Ok(response) => Ok(response.into_result()),
            Err(e) => Err(RefactorError::AgentUnavailable {
                url: run.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn load_settings(&self) -> Result<Settings, RefactorError> {
        self.settings
            .load()
            .await
            .map_err(|e| RefactorError::storage("settings", e))
    }

    async fn client(&self) -> Result<LlmClient, RefactorError> {
        let settings = self.load_settings().await?;
        self.client_for(&settings)
    }

    fn client_for(&self, settings: &Settings) -> Result<LlmClient, RefactorError> {
        let missing = settings.missing_credentials();
        if !missing.is_empty() {
            return Err(RefactorError::LLMConfigMissing { missing });
        }
        let provider = self.providers.create(settings).map_err(|source| {
            RefactorError::LLMTransportFailure {
                provider: settings.provider.to_string(),
                source,
            }
        })?;
        Ok(LlmClient::new(provider)
            .with_model(settings.effective_model())
            .with_max_tokens(settings.max_tokens)
            .with_exchange_log(ExchangeLog::new(self.store.clone())))
    }

    async fn attempt_loop(
        &self,
        run: &PageRun,
        client: &LlmClient,
        summary: &PageSummary,
        prompt: &str,
    ) -> Result<RefactorOutcome, RefactorError> {
        let max_attempts = self.pipeline.max_attempts.max(1);
        let mut retry: Option<RetryContext> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let batch = self.propose(run, client, summary, prompt, retry.as_ref()).await?;
            let blocked = batch.blocked_selectors();

            match self.execute(run, &batch.commands).await? {
                Execution::Applied(report) => {
                    self.remember(run, &batch.commands, prompt, attempt);
                    return Ok(RefactorOutcome {
                        tab: run.tab,
                        url: run.url.clone(),
                        commands: batch.commands,
                        report,
                        attempts: attempt,
                        rejections: batch.rejections,
                    });
                }
                Execution::WhitePage(damage) => {
                    let last = attempt >= max_attempts;
                    let rollback = self.rollback(run, &damage, !last).await?;
                    if last {
                        return Err(RefactorError::WhitePageDetected {
                            url: run.url.clone(),
                            attempts: attempt,
                            rollback,
                        });
                    }
                    info!(tab = %run.tab, attempt, "Retrying after white page");
                    retry = Some(RetryContext::from_damage(&damage, &blocked, attempt));
                }
            }
        }
    }

    async fn propose(
        &self,
        run: &PageRun,
        client: &LlmClient,
        summary: &PageSummary,
        prompt: &str,
        retry: Option<&RetryContext>,
    ) -> Result<ParsedBatch, RefactorError> {
        let text = client.generate(summary, prompt, retry).await.map_err(|source| {
            RefactorError::LLMTransportFailure {
                provider: client.provider_id().to_string(),
                source,
            }
        })?;
        self.ensure_current(run)?;

        match self.parser.parse(&text) {
            Ok(batch) => {
                if !batch.rejections.is_empty() {
                    info!(
                        tab = %run.tab,
                        accepted = batch.commands.len(),
                        rejected = batch.rejections.len(),
                        "Some proposed commands were rejected"
                    );
                }
                Ok(batch)
            }
            Err(e @ ParseError::NoBatch) => Err(RefactorError::LLMParseFailure {
                reason: e.to_string(),
            }),
            Err(ParseError::NoValidCommands { rejections }) => {
                Err(RefactorError::NoValidCommands {
                    rejected: rejections.len(),
                })
            }
        }
    }

    async fn execute(
        &self,
        run: &PageRun,
        commands: &[MutationCommand],
    ) -> Result<Execution, RefactorError> {
        info!(tab = %run.tab, commands = commands.len(), "Executing batch");
        let request = AgentRequest::ExecuteCommands {
            commands: commands.to_vec(),
        };
        match self.request(run, request).await? {
            Ok(AgentReply::Executed(report)) => {
                for failed in report.failed() {
                    debug!(
                        index = failed.index,
                        selector = %failed.selector,
                        error = failed.error.as_deref().unwrap_or_default(),
                        "Command did not apply"
                    );
                }
                Ok(Execution::Applied(report))
            }
            Ok(other) => Err(unexpected(run, "executeCommands", &other)),
            Err(AgentFailure {
                damage: Some(damage),
                ..
            }) => {
                warn!(
                    tab = %run.tab,
                    signals = ?damage.signals,
                    rollback = %damage.rollback,
                    "White page detected"
                );
                Ok(Execution::WhitePage(damage))
            }
            Err(failure) if failure.message.contains("White page") => {
                warn!(tab = %run.tab, "White page reported without damage details");
                Ok(Execution::WhitePage(self.damage_from_debug_logs(run, commands).await))
            }
            Err(failure) => Err(agent_failure(run, failure)),
        }
    }

    /// Reconstruct a damage signature from the agent's diagnostic state.
    async fn damage_from_debug_logs(&self, run: &PageRun, commands: &[MutationCommand]) -> DamageSignature {
        let logs = match self.request(run, AgentRequest::GetDebugLogs).await {
            Ok(Ok(AgentReply::DebugLogs(logs))) => logs,
            other => {
                debug!(tab = %run.tab, ?other, "Debug logs unavailable");
                Default::default()
            }
        };
        DamageSignature {
            before: logs.last_before.unwrap_or_default(),
            after: logs.last_after.unwrap_or_default(),
            batch: if logs.last_batch.is_empty() {
                commands.to_vec()
            } else {
                logs.last_batch
            },
            blocked_selectors: logs.blocked_selectors,
            signals: Vec::new(),
            rollback: RollbackOutcome::RollbackFailed,
        }
    }

    /// Put the page back after a white page. `force` resets even when the
    /// agent already rolled back locally.
    async fn rollback(
        &self,
        run: &PageRun,
        damage: &DamageSignature,
        force: bool,
    ) -> Result<RollbackOutcome, RefactorError> {
        if !force && damage.rollback == RollbackOutcome::RolledBack {
            return Ok(RollbackOutcome::RolledBack);
        }
        match self.restore(run).await {
            Ok(_) => Ok(RollbackOutcome::RolledBack),
            Err(e @ RefactorError::TabClosed(_)) => Err(e),
            Err(e) => {
                warn!(tab = %run.tab, error = %e, "Controller reset failed");
                Ok(damage.rollback)
            }
        }
    }

    /// Ask the agent to restore, handing it the retained snapshot.
    async fn restore(&self, run: &PageRun) -> Result<bool, RefactorError> {
        let request = AgentRequest::Reset {
            original_state: self.tabs.snapshot(run.tab),
        };
        match self.request(run, request).await? {
            Ok(AgentReply::Restored { used_fallback }) => Ok(used_fallback),
            Ok(other) => Err(unexpected(run, "reset", &other)),
            Err(failure) if failure.message == AgentError::NoOriginalState.to_string() => {
                Err(RefactorError::NoOriginalState(run.tab))
            }
            Err(failure) => Err(agent_failure(run, failure)),
        }
    }

    fn remember(&self, run: &PageRun, commands: &[MutationCommand], prompt: &str, attempt: u32) {
        let stored = self.tabs.record_success(
            run.tab,
            run.generation,
            LastBatch {
                commands: commands.to_vec(),
                prompt: prompt.to_string(),
                url: run.url.clone(),
                attempt,
                recorded_at: tokio::time::Instant::now(),
            },
        );
        if !stored {
            debug!(tab = %run.tab, "Tab changed; successful batch not remembered");
        }
    }

    async fn apply_entry(
        &self,
        run: &PageRun,
        hostname: String,
        mut entry: DomainMemoryEntry,
    ) -> Result<MemoryApplied, RefactorError> {
        let summary = self.prepare(run).await?;

        if entry.has_commands() {
            info!(tab = %run.tab, hostname, "Replaying stored commands");
            let (commands, dropped) = admissible(entry.commands.clone());
            if commands.is_empty() {
                return Err(RefactorError::NoValidCommands { rejected: dropped });
            }
            return match self.execute(run, &commands).await? {
                Execution::Applied(report) => {
                    self.remember(run, &commands, &entry.prompt, 1);
                    Ok(MemoryApplied {
                        hostname,
                        source: ReplaySource::StoredCommands,
                        outcome: RefactorOutcome {
                            tab: run.tab,
                            url: run.url.clone(),
                            commands,
                            report,
                            attempts: 1,
                            rejections: Vec::new(),
                        },
                        entry,
                    })
                }
                Execution::WhitePage(damage) => {
                    let rollback = self.rollback(run, &damage, false).await?;
                    Err(RefactorError::WhitePageDetected {
                        url: run.url.clone(),
                        attempts: 1,
                        rollback,
                    })
                }
            };
        }

        info!(tab = %run.tab, hostname, "Regenerating commands from stored prompt");
        let client = self.client().await?;
        let outcome = self.attempt_loop(run, &client, &summary, &entry.prompt).await?;
        entry.upgrade(outcome.commands.clone(), run.url.clone());
        self.memory
            .save_domain_config(&entry)
            .await
            .map_err(|e| RefactorError::storage(domain_config_key(&entry.domain), e))?;
        Ok(MemoryApplied {
            hostname,
            source: ReplaySource::Prompt,
            entry,
            outcome,
        })
    }
}

fn agent_failure(run: &PageRun, failure: AgentFailure) -> RefactorError {
    RefactorError::AgentUnavailable {
        url: run.url.clone(),
        reason: failure.message,
    }
}

fn unexpected(run: &PageRun, action: &str, reply: &AgentReply) -> RefactorError {
    RefactorError::AgentUnavailable {
        url: run.url.clone(),
        reason: format!("unexpected reply to {action}: {reply:?}"),
    }
}
