//! Ledger access seam for the monitor
//!
//! [`LocalLedgerClient`] drives a ledger opened in the same process.
//! [`RemoteLedgerClient`] talks to a `lending-node` over its HTTP API, which is
//! the only option when another process owns the ledger directory.

use crate::{Error, Result};
use async_trait::async_trait;
use lending_core::server::INSTRUCTIONS_PATH;
use lending_core::{
    ErrorBody, ErrorKind, Ledger, Loan, ProtocolRegistry, Receipt, SignedInstruction,
};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What the monitor needs from a ledger
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Current registry
    async fn fetch_registry(&self) -> Result<ProtocolRegistry>;

    /// Every loan on record
    async fn fetch_loans(&self) -> Result<Vec<Loan>>;

    /// Submit a signed instruction
    async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt>;
}

/// Client over an in-process [`Ledger`]
#[derive(Debug, Clone)]
pub struct LocalLedgerClient {
    ledger: Arc<Ledger>,
}

impl LocalLedgerClient {
    /// Wrap a ledger
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

#[async_trait]
impl ProtocolClient for LocalLedgerClient {
    async fn fetch_registry(&self) -> Result<ProtocolRegistry> {
        Ok(self.ledger.registry()?)
    }

    async fn fetch_loans(&self) -> Result<Vec<Loan>> {
        Ok(self.ledger.loans()?)
    }

    async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt> {
        Ok(self.ledger.submit(instruction).await?)
    }
}

/// Client over a remote node API
#[derive(Debug, Clone)]
pub struct RemoteLedgerClient {
    base_url: String,
    http: Client,
}

impl RemoteLedgerClient {
    /// Client for the node at `base_url` (`http://host:port`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    /// Node address
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl ProtocolClient for RemoteLedgerClient {
    async fn fetch_registry(&self) -> Result<ProtocolRegistry> {
        self.get("/api/v1/registry").await
    }

    async fn fetch_loans(&self) -> Result<Vec<Loan>> {
        self.get("/api/v1/loans").await
    }

    async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt> {
        let body = instruction.to_bytes()?;
        let response = self
            .http
            .post(format!("{}{}", self.base_url, INSTRUCTIONS_PATH))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        decode(response).await
    }
}

/// Success bodies are JSON values, failures an [`ErrorBody`]
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await?;
    Err(match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Error::Rejected {
            status: status.as_u16(),
            kind: body.error.kind,
            message: body.error.message,
        },
        Err(_) => Error::Rejected {
            status: status.as_u16(),
            kind: kind_for_status(status),
            message: text,
        },
    })
}

/// Fallback when a reply carries no [`ErrorBody`]
fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            ErrorKind::Liveness
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authorization,
        StatusCode::CONFLICT => ErrorKind::StateConflict,
        s if s.is_server_error() => ErrorKind::Internal,
        _ => ErrorKind::Validation,
    }
}
