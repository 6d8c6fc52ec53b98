use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PortalError;

/// Port the desktop genome browser listens on for batch commands.
pub const DEFAULT_BRIDGE_PORT: u16 = 60151;

/// Status reported when the transaction never produced a response.
pub const NO_RESPONSE: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BridgeOutcome {
    Success,
    /// The companion is probably not running; hand the URI to the user.
    Unreachable { manual_uri: String },
}

impl BridgeOutcome {
    pub fn into_result(self) -> Result<(), PortalError> {
        match self {
            BridgeOutcome::Success => Ok(()),
            BridgeOutcome::Unreachable { manual_uri } => {
                Err(PortalError::BridgeUnreachable { uri: manual_uri })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeRequest {
    pub file: String,
    pub name: String,
    pub index: Option<String>,
}

/// One GET against the local companion, reduced to a status code.
/// Transport failures of any kind report [`NO_RESPONSE`].
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn get_status(&self, url: &Url) -> u16;
}

#[derive(Clone)]
pub struct HttpBridgeTransport {
    client: Client,
}

impl HttpBridgeTransport {
    /// No request timeout; the connection failure is the signal.
    pub fn new() -> Result<Self, PortalError> {
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|err| PortalError::PortalHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BridgeTransport for HttpBridgeTransport {
    async fn get_status(&self, url: &Url) -> u16 {
        match self.client.get(url.clone()).send().await {
            Ok(response) => response.status().as_u16(),
            Err(err) => {
                debug!(error = %err, "desktop bridge transport failure");
                NO_RESPONSE
            }
        }
    }
}

/// Maps the transport signal onto the two outcomes. Only a 2xx counts as
/// success; a misconfigured but running companion is indistinguishable
/// from an absent one and reads as unreachable.
pub fn classify_status(status: u16, manual_uri: &str) -> BridgeOutcome {
    if (200..300).contains(&status) {
        BridgeOutcome::Success
    } else {
        BridgeOutcome::Unreachable {
            manual_uri: manual_uri.to_string(),
        }
    }
}

pub struct DesktopBridgeClient<T: BridgeTransport = HttpBridgeTransport> {
    transport: T,
    port: u16,
}

impl DesktopBridgeClient<HttpBridgeTransport> {
    pub fn new(port: u16) -> Result<Self, PortalError> {
        Ok(Self::with_transport(HttpBridgeTransport::new()?, port))
    }
}

impl<T: BridgeTransport> DesktopBridgeClient<T> {
    pub fn with_transport(transport: T, port: u16) -> Self {
        Self { transport, port }
    }

    pub fn load_url(&self, request: &BridgeRequest) -> Result<Url, PortalError> {
        let mut params = vec![("file", request.file.as_str()), ("name", request.name.as_str())];
        if let Some(index) = &request.index {
            params.push(("index", index.as_str()));
        }
        Url::parse_with_params(&format!("http://localhost:{}/load", self.port), &params)
            .map_err(|err| PortalError::PortalHttp(err.to_string()))
    }

    /// Hands `request` to the companion. Exactly one outcome per probe.
    pub async fn probe_open(&self, request: &BridgeRequest) -> BridgeOutcome {
        let url = match self.load_url(request) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "could not build desktop bridge url");
                return classify_status(NO_RESPONSE, &request.file);
            }
        };
        let status = self.transport.get_status(&url).await;
        let outcome = classify_status(status, &request.file);
        match &outcome {
            BridgeOutcome::Success => info!(name = %request.name, "opened in desktop companion"),
            BridgeOutcome::Unreachable { .. } => {
                info!(name = %request.name, status, "desktop companion unreachable")
            }
        }
        outcome
    }
}
