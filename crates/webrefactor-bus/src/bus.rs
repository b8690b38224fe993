//! Per-tab mailboxes with correlated replies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use webrefactor_protocols::{AgentRequest, AgentResponse, BusError, PageChannel, TabId};

/// Requests queued per tab before senders wait.
const MAILBOX_CAPACITY: usize = 32;

/// One request in flight.
#[derive(Debug)]
pub struct Envelope {
    pub correlation_id: u64,
    pub request: AgentRequest,
    reply: oneshot::Sender<AgentResponse>,
}

impl Envelope {
    /// Answer the request. A sender that already gave up is not an error.
    pub fn reply(self, response: AgentResponse) {
        if self.reply.send(response).is_err() {
            debug!(
                correlation_id = self.correlation_id,
                "Reply dropped; requester no longer waiting"
            );
        }
    }
}

/// The agent's end of a tab's channel.
#[derive(Debug)]
pub struct Mailbox {
    tab: TabId,
    rx: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Next request, or `None` once the tab is unregistered.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Routes requests to the agent registered for each tab.
#[derive(Debug, Default)]
pub struct MessageBus {
    listeners: DashMap<TabId, mpsc::Sender<Envelope>>,
    next_id: AtomicU64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a tab, replacing any previous one.
    pub fn register(&self, tab: TabId) -> Mailbox {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        if self.listeners.insert(tab, tx).is_some() {
            debug!(%tab, "Replaced existing listener");
        }
        Mailbox { tab, rx }
    }

    /// Drop a tab's listener. Its mailbox drains and then ends.
    pub fn unregister(&self, tab: TabId) {
        self.listeners.remove(&tab);
    }

    pub fn has_listener(&self, tab: TabId) -> bool {
        self.listeners
            .get(&tab)
            .is_some_and(|tx| !tx.is_closed())
    }

    async fn dispatch(
        &self,
        tab: TabId,
        request: AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, BusError> {
        let action = request.name();
        let sender = self.listeners.get(&tab).map(|tx| tx.clone());
        let sender = match sender {
            Some(tx) if !tx.is_closed() => tx,
            Some(_) => {
                self.listeners.remove(&tab);
                return Err(BusError::NoListener(tab));
            }
            None => return Err(BusError::NoListener(tab)),
        };

        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        let envelope = Envelope {
            correlation_id,
            request,
            reply,
        };

        // One deadline covers both the wait for mailbox space and the reply.
        let deadline = Instant::now() + timeout;
        let timed_out = || {
            warn!(%tab, correlation_id, action, "Request timed out");
            BusError::Timeout {
                tab,
                action,
                millis: timeout.as_millis() as u64,
            }
        };

        trace!(%tab, correlation_id, action, "Sending request");
        match tokio::time::timeout_at(deadline, sender.send(envelope)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                self.listeners.remove(&tab);
                return Err(BusError::NoListener(tab));
            }
            Err(_) => return Err(timed_out()),
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(response)) => {
                trace!(%tab, correlation_id, success = response.success, "Received reply");
                Ok(response)
            }
            Ok(Err(_)) => Err(BusError::Closed(tab)),
            Err(_) => Err(timed_out()),
        }
    }
}

#[async_trait]
impl PageChannel for MessageBus {
    async fn request(
        &self,
        tab: TabId,
        request: AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, BusError> {
        self.dispatch(tab, request, timeout).await
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
