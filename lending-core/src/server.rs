//! HTTP node API over a [`Ledger`]
//!
//! The node process owns the RocksDB directory; everything else (the default
//! monitor, borrower and lender tooling) talks to it through these routes.
//!
//! - `GET /health`
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /api/v1/registry`
//! - `GET /api/v1/stats`
//! - `GET /api/v1/loans?state=Active`
//! - `GET /api/v1/loans/{borrower}/{loan_id}`
//! - `GET /api/v1/escrows/{borrower}/{loan_id}`
//! - `GET /api/v1/reputations/{owner}`
//! - `GET /api/v1/balances/{owner}`
//! - `GET /api/v1/events?from=0&limit=100`
//! - `POST /api/v1/instructions` - bincode [`SignedInstruction`] in, JSON [`Receipt`] out
//!
//! Failures reply with an [`ErrorBody`] whose status follows [`ErrorKind`].

use crate::{Amount, Error, ErrorKind, Identity, Ledger, LoanId, LoanState, SignedInstruction};
use actix_web::{
    dev::Server, error::ResponseError, http::StatusCode, web, App, HttpResponse, HttpServer,
};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tracing::{debug, info};

/// Route accepting signed instructions
pub const INSTRUCTIONS_PATH: &str = "/api/v1/instructions";

/// Largest event page served at once
pub const MAX_EVENT_PAGE: usize = 1000;

/// Error reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Failure details
    pub error: ErrorDetail,
}

/// Failure details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// HTTP status
    pub code: u16,
    /// Rendered ledger error
    pub message: String,
    /// Error class
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Whether the same request may succeed later
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    version: String,
    initialized: bool,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    owner: Identity,
    balance: Amount,
}

#[derive(Debug, Deserialize)]
struct LoansQuery {
    state: Option<LoanState>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    from: u64,
    limit: Option<usize>,
}

/// Status for an error class
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::StateConflict | ErrorKind::FrozenAccount => StatusCode::CONFLICT,
        ErrorKind::Liveness => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::LoanNotFound(_) | Error::ReputationNotFound(_) => StatusCode::NOT_FOUND,
            _ => status_for(self.kind()),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            error: ErrorDetail {
                code: status.as_u16(),
                message: self.to_string(),
                kind: self.kind(),
                retryable: self.is_retryable(),
            },
        })
    }
}

/// Register every route on `cfg`; the app must carry `web::Data<Ledger>`
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics))
        .route("/api/v1/registry", web::get().to(registry))
        .route("/api/v1/stats", web::get().to(stats))
        .route("/api/v1/loans", web::get().to(loans))
        .route("/api/v1/loans/{borrower}/{loan_id}", web::get().to(loan))
        .route("/api/v1/escrows/{borrower}/{loan_id}", web::get().to(escrow))
        .route("/api/v1/reputations/{owner}", web::get().to(reputation))
        .route("/api/v1/balances/{owner}", web::get().to(balance))
        .route("/api/v1/events", web::get().to(events))
        .route(INSTRUCTIONS_PATH, web::post().to(submit));
}

/// Serve `ledger` on an already bound listener
///
/// Signal handling is left to the caller; stop the server through
/// [`Server::handle`].
pub fn run(ledger: Arc<Ledger>, listener: TcpListener) -> std::io::Result<Server> {
    let workers = ledger.config().http.workers;
    let addr = listener.local_addr()?;
    let data = web::Data::from(ledger);

    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .workers(workers)
        .disable_signals()
        .listen(listener)?
        .run();

    info!(%addr, workers, "Node API listening");
    Ok(server)
}

/// Bind `http.bind_addr` from the ledger config and serve
pub fn bind(ledger: Arc<Ledger>) -> std::io::Result<(Server, SocketAddr)> {
    let listener = TcpListener::bind(&ledger.config().http.bind_addr)?;
    let addr = listener.local_addr()?;
    Ok((run(ledger, listener)?, addr))
}

async fn health(ledger: web::Data<Ledger>) -> HttpResponse {
    let config = ledger.config();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: config.service_name.clone(),
        version: config.service_version.clone(),
        initialized: ledger.registry().is_ok(),
    })
}

async fn metrics(ledger: web::Data<Ledger>) -> Result<HttpResponse, Error> {
    let text = ledger.metrics().render()?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(text))
}

async fn registry(ledger: web::Data<Ledger>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(ledger.registry()?))
}

async fn stats(ledger: web::Data<Ledger>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(ledger.stats()?))
}

async fn loans(
    ledger: web::Data<Ledger>,
    query: web::Query<LoansQuery>,
) -> Result<HttpResponse, Error> {
    let loans = match query.state {
        Some(state) => ledger.loans_in_state(state)?,
        None => ledger.loans()?,
    };
    Ok(HttpResponse::Ok().json(loans))
}

async fn loan(
    ledger: web::Data<Ledger>,
    path: web::Path<(String, LoanId)>,
) -> Result<HttpResponse, Error> {
    let (borrower, loan_id) = path.into_inner();
    let borrower: Identity = borrower.parse()?;
    Ok(HttpResponse::Ok().json(ledger.loan(&borrower, loan_id)?))
}

async fn escrow(
    ledger: web::Data<Ledger>,
    path: web::Path<(String, LoanId)>,
) -> Result<HttpResponse, Error> {
    let (borrower, loan_id) = path.into_inner();
    let borrower: Identity = borrower.parse()?;
    Ok(HttpResponse::Ok().json(ledger.escrow(&borrower, loan_id)?))
}

async fn reputation(
    ledger: web::Data<Ledger>,
    owner: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let owner: Identity = owner.parse()?;
    Ok(HttpResponse::Ok().json(ledger.reputation(&owner)?))
}

async fn balance(
    ledger: web::Data<Ledger>,
    owner: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let owner: Identity = owner.parse()?;
    let balance = ledger.balance(&owner)?;
    Ok(HttpResponse::Ok().json(BalanceResponse { owner, balance }))
}

async fn events(
    ledger: web::Data<Ledger>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, Error> {
    let limit = query.limit.unwrap_or(100).min(MAX_EVENT_PAGE);
    Ok(HttpResponse::Ok().json(ledger.events(query.from, limit)?))
}

async fn submit(ledger: web::Data<Ledger>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let instruction = SignedInstruction::from_bytes(&body)?;
    debug!(
        instruction = instruction.instruction.name(),
        signer = %instruction.signer,
        "Instruction received"
    );
    let receipt = ledger.submit(instruction).await?;
    Ok(HttpResponse::Ok().json(receipt))
}
