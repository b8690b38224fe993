//! Controller → Page Agent channel protocol.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BusError;
use crate::host::TabId;
use crate::message::{AgentRequest, AgentResponse};

/// Request/response transport to the agent living in a tab.
///
/// Implementations must keep three outcomes apart: no agent listening
/// ([`BusError::NoListener`], a signal to inject), no answer in time
/// ([`BusError::Timeout`], a protocol failure) and an answer carrying
/// `success: false` (an `Ok` response).
#[async_trait]
pub trait PageChannel: Send + Sync {
    async fn request(
        &self,
        tab: TabId,
        request: AgentRequest,
        timeout: Duration,
    ) -> Result<AgentResponse, BusError>;
}
