//! In-process tab host.
//!
//! Keeps a set of tabs, each holding a parsed document, and runs one
//! [`PageAgent`] task per tab once the agent has been injected. Agents
//! talk to the Controller only through the shared [`MessageBus`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use webrefactor_bus::MessageBus;
use webrefactor_protocols::{HostError, TabHost, TabId};

use crate::agent::{AgentSettings, PageAgent};
use crate::document::PageDocument;

/// Schemes a host never runs scripts in.
const PRIVILEGED_SCHEMES: [&str; 7] = [
    "chrome",
    "chrome-extension",
    "edge",
    "about",
    "data",
    "view-source",
    "devtools",
];

struct TabEntry {
    document: Arc<Mutex<PageDocument>>,
    agent: Option<JoinHandle<()>>,
}

impl TabEntry {
    fn stop_agent(&mut self) {
        if let Some(handle) = self.agent.take() {
            handle.abort();
        }
    }
}

/// Tabs living in this process.
pub struct LocalBrowser {
    bus: Arc<MessageBus>,
    tabs: DashMap<TabId, TabEntry>,
    next_tab: AtomicU64,
    settings: AgentSettings,
    injection_blocked: AtomicBool,
}

impl LocalBrowser {
    pub fn new(bus: Arc<MessageBus>, settings: AgentSettings) -> Self {
        Self {
            bus,
            tabs: DashMap::new(),
            next_tab: AtomicU64::new(1),
            settings,
            injection_blocked: AtomicBool::new(false),
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Open a tab showing `markup` at `url`. No agent runs in it yet.
    pub fn open_tab(&self, url: &str, markup: &str) -> TabId {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        let document = Arc::new(Mutex::new(PageDocument::parse(markup, url)));
        self.tabs.insert(
            tab,
            TabEntry {
                document,
                agent: None,
            },
        );
        debug!(%tab, url, "Opened tab");
        tab
    }

    /// Close a tab; its agent stops and its listener goes away.
    pub fn close_tab(&self, tab: TabId) -> Result<(), HostError> {
        let (_, mut entry) = self.tabs.remove(&tab).ok_or(HostError::TabNotFound(tab))?;
        entry.stop_agent();
        self.bus.unregister(tab);
        debug!(%tab, "Closed tab");
        Ok(())
    }

    /// Load a new page into the tab. The previous page's agent does not
    /// survive navigation.
    pub fn navigate(&self, tab: TabId, url: &str, markup: &str) -> Result<(), HostError> {
        let mut entry = self.tabs.get_mut(&tab).ok_or(HostError::TabNotFound(tab))?;
        entry.stop_agent();
        self.bus.unregister(tab);
        entry.document.lock().load(markup, url);
        debug!(%tab, url, "Navigated");
        Ok(())
    }

    pub fn document(&self, tab: TabId) -> Result<Arc<Mutex<PageDocument>>, HostError> {
        self.tabs
            .get(&tab)
            .map(|entry| entry.document.clone())
            .ok_or(HostError::TabNotFound(tab))
    }

    /// Current serialized markup of a tab.
    pub fn document_html(&self, tab: TabId) -> Result<String, HostError> {
        Ok(self.document(tab)?.lock().serialize())
    }

    pub fn agent_running(&self, tab: TabId) -> bool {
        self.tabs
            .get(&tab)
            .is_some_and(|entry| entry.agent.as_ref().is_some_and(|h| !h.is_finished()))
    }

    /// Make every injection fail, as a locked-down page would.
    pub fn set_injection_blocked(&self, blocked: bool) {
        self.injection_blocked.store(blocked, Ordering::Relaxed);
    }

    fn refusal(&self, url: &str) -> Option<String> {
        if self.injection_blocked.load(Ordering::Relaxed) {
            return Some("script injection is disabled".to_string());
        }
        match Url::parse(url) {
            Ok(parsed) if PRIVILEGED_SCHEMES.contains(&parsed.scheme()) => {
                Some(format!("{} pages are privileged", parsed.scheme()))
            }
            Ok(_) => None,
            Err(e) => Some(format!("invalid url: {e}")),
        }
    }
}

#[async_trait]
impl TabHost for LocalBrowser {
    async fn tab_url(&self, tab: TabId) -> Result<String, HostError> {
        Ok(self.document(tab)?.lock().url().to_string())
    }

    async fn inject_agent(&self, tab: TabId) -> Result<(), HostError> {
        let mut entry = self.tabs.get_mut(&tab).ok_or(HostError::TabNotFound(tab))?;
        let url = entry.document.lock().url().to_string();

        if let Some(reason) = self.refusal(&url) {
            warn!(%tab, %url, %reason, "Agent injection refused");
            return Err(HostError::InjectionRefused { url, reason });
        }

        if self.bus.has_listener(tab) {
            debug!(%tab, "Agent already listening");
            return Ok(());
        }

        entry.stop_agent();
        let mailbox = self.bus.register(tab);
        let agent = PageAgent::new(entry.document.clone(), self.settings.clone());
        entry.agent = Some(tokio::spawn(agent.serve(mailbox)));
        info!(%tab, %url, "Injected page agent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use webrefactor_protocols::{AgentReply, AgentRequest, PageChannel};

    const PAGE: &str = "<html><head><title>T</title></head><body><p>hello</p></body></html>";
    const TIMEOUT: Duration = Duration::from_secs(1);

    fn browser() -> LocalBrowser {
        LocalBrowser::new(Arc::new(MessageBus::new()), AgentSettings::default())
    }

    #[tokio::test]
    async fn test_injected_agent_answers_ping() {
        let browser = browser();
        let tab = browser.open_tab("https://a.test/", PAGE);
        assert!(browser.bus().request(tab, AgentRequest::Ping, TIMEOUT).await.unwrap_err().is_no_listener());

        browser.inject_agent(tab).await.unwrap();
        let reply = browser
            .bus()
            .request(tab, AgentRequest::Ping, TIMEOUT)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(reply, AgentReply::Pong);
        assert!(browser.agent_running(tab));
    }

    #[tokio::test]
    async fn test_privileged_pages_refuse_injection() {
        let browser = browser();
        let tab = browser.open_tab("chrome://settings", PAGE);
        let err = browser.inject_agent(tab).await.unwrap_err();
        assert!(matches!(err, HostError::InjectionRefused { .. }));
        assert!(!browser.bus().has_listener(tab));
    }

    #[tokio::test]
    async fn test_blocked_injection() {
        let browser = browser();
        let tab = browser.open_tab("https://a.test/", PAGE);
        browser.set_injection_blocked(true);
        assert!(browser.inject_agent(tab).await.is_err());
    }

    #[tokio::test]
    async fn test_navigation_drops_agent() {
        let browser = browser();
        let tab = browser.open_tab("https://a.test/", PAGE);
        browser.inject_agent(tab).await.unwrap();

        browser
            .navigate(tab, "https://b.test/next", "<body><p>next</p></body>")
            .unwrap();
        assert_eq!(browser.tab_url(tab).await.unwrap(), "https://b.test/next");
        assert!(!browser.bus().has_listener(tab));
        assert!(browser.document_html(tab).unwrap().contains("next"));
    }

    #[tokio::test]
    async fn test_close_tab() {
        let browser = browser();
        let tab = browser.open_tab("https://a.test/", PAGE);
        browser.inject_agent(tab).await.unwrap();
        browser.close_tab(tab).unwrap();

        assert!(matches!(browser.tab_url(tab).await, Err(HostError::TabNotFound(_))));
        assert!(matches!(browser.close_tab(tab), Err(HostError::TabNotFound(_))));
        let err = browser
            .bus()
            .request(tab, AgentRequest::Ping, TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_no_listener());
    }
}
