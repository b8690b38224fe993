#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use webrefactor_agent::{AgentSettings, LocalBrowser};
use webrefactor_bus::MessageBus;
use webrefactor_config::{PipelineConfig, Settings};
use webrefactor_protocols::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, TabId,
};
use webrefactor_runtime::{Controller, ProviderFactory};
use webrefactor_storage_json::MemoryStore;

pub const NEWS: &str = include_str!("../fixtures/news.html");
pub const NEWS_URL: &str = "https://news.example.com/today";

/// Provider that answers from a script, in order.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    hook: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        })
    }

    pub fn failing(error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        })
    }

    /// Run `hook` inside every completion call.
    pub fn set_hook(&self, hook: impl FnMut() + Send + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().push(request);
        if let Some(hook) = self.hook.lock().as_mut() {
            hook();
        }
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::MalformedResponse("script exhausted".into())));
        reply.map(|text| CompletionResponse {
            model: "scripted-1".into(),
            text,
        })
    }
}

/// A batch reply in the shape the model is asked for.
pub fn actions(commands: &[serde_json::Value]) -> String {
    serde_json::json!({ "actions": commands }).to_string()
}

pub fn hide(selector: &str) -> serde_json::Value {
    serde_json::json!({ "type": "hide", "selector": selector })
}

pub fn remove(selector: &str) -> serde_json::Value {
    serde_json::json!({ "type": "remove", "selector": selector })
}

pub struct Harness {
    pub browser: Arc<LocalBrowser>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub controller: Arc<Controller>,
}

impl Harness {
    /// Controller with credentials configured.
    pub async fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self::with_pipeline(provider, PipelineConfig::default()).await
    }

    pub async fn with_pipeline(provider: Arc<ScriptedProvider>, pipeline: PipelineConfig) -> Self {
        let harness = Self::build(provider, pipeline);
        harness
            .controller
            .settings()
            .save(&Settings {
                api_url: "https://llm.test/v1/chat/completions".into(),
                api_key: "sk-test".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        harness
    }

    pub fn unconfigured(provider: Arc<ScriptedProvider>) -> Self {
        Self::build(provider, PipelineConfig::default())
    }

    fn build(provider: Arc<ScriptedProvider>, pipeline: PipelineConfig) -> Self {
        let bus = Arc::new(MessageBus::new());
        let browser = Arc::new(LocalBrowser::new(bus.clone(), AgentSettings::default()));
        let store = Arc::new(MemoryStore::new());

        let shared = provider.clone();
        let factory: Arc<dyn ProviderFactory> = Arc::new(
            move |_: &Settings| -> Result<Arc<dyn LLMProvider>, ProviderError> {
                Ok(shared.clone() as Arc<dyn LLMProvider>)
            },
        );
        let controller = Controller::new(browser.clone(), bus, store.clone(), factory)
            .with_pipeline(pipeline);

        Self {
            browser,
            store,
            provider,
            controller: Arc::new(controller),
        }
    }

    pub fn open_news(&self) -> TabId {
        self.browser.open_tab(NEWS_URL, NEWS)
    }

    pub fn html(&self, tab: TabId) -> String {
        self.browser.document_html(tab).unwrap()
    }
}
