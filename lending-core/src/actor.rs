//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One writer task applies instructions strictly in mailbox order
//! - Each instruction is verified, applied to copies and committed in one batch
//! - Async message passing with backpressure (bounded mailbox)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        Clients / DefaultMonitor (many tasks)         │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ SignedInstruction
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                   │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)               │
//! │   verify → replay check → lifecycle::apply           │
//! │                       │                              │
//! │                       ▼                              │
//! │              Storage::commit()                       │
//! │          (atomic write to RocksDB)                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Reads bypass the actor and go straight to [`Storage`]; they only ever
//! observe fully committed batches.

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::events::{EventKind, LedgerEvent};
use crate::instruction::{Receipt, SignedInstruction};
use crate::lifecycle;
use crate::metrics::Metrics;
use crate::types::LoanState;
use crate::{Error, Result, Storage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply a signed instruction
    Submit {
        /// Instruction to apply
        instruction: SignedInstruction,
        /// Outcome
        response: oneshot::Sender<Result<Receipt>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Ledger time source
    clock: Arc<dyn Clock>,

    /// Metrics
    metrics: Metrics,

    /// Sequence the next event gets
    next_sequence: u64,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Result<Self> {
        let next_sequence = storage.last_sequence()? + 1;
        Ok(Self {
            storage,
            mailbox,
            clock,
            metrics,
            next_sequence,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Submit {
                    instruction,
                    response,
                } => {
                    let result = self.process(&instruction);
                    let _ = response.send(result);
                }
                LedgerMessage::Shutdown => break,
            }
        }

        tracing::info!(next_sequence = self.next_sequence, "Ledger actor stopped");
    }

    fn process(&mut self, signed: &SignedInstruction) -> Result<Receipt> {
        let started = Instant::now();
        let name = signed.instruction.name();
        let result = self.apply(signed);

        match &result {
            Ok(receipt) => {
                self.metrics
                    .record_applied(name, started.elapsed().as_secs_f64());
                tracing::info!(
                    instruction = name,
                    signer = %signed.signer.short(),
                    sequence = receipt.sequence,
                    "Instruction applied"
                );
            }
            Err(e) => {
                self.metrics.record_rejected(name);
                if e.kind() == ErrorKind::Internal {
                    tracing::error!(instruction = name, error = %e, "Instruction failed");
                } else {
                    tracing::warn!(
                        instruction = name,
                        signer = %signed.signer.short(),
                        error = %e,
                        "Instruction rejected"
                    );
                }
            }
        }

        result
    }

    fn apply(&mut self, signed: &SignedInstruction) -> Result<Receipt> {
        signed.verify()?;

        let digest = signed.digest()?;
        if self.storage.has_digest(&digest)? {
            return Err(Error::DuplicateInstruction(hex::encode(digest)));
        }

        let now = self.clock.now();
        let transition =
            lifecycle::apply(self.storage.as_ref(), &signed.signer, &signed.instruction, now)?;

        let sequence = self.next_sequence;
        let event = LedgerEvent {
            sequence,
            kind: transition.kind,
            signer: signed.signer,
            loan: transition.loan,
            digest,
            timestamp: now,
        };
        self.storage.commit(&transition.changes, &event)?;
        self.next_sequence += 1;

        match transition.kind {
            EventKind::LoanFunded => self.metrics.active_loans.inc(),
            EventKind::LoanRepaid | EventKind::LoanDefaulted => self.metrics.active_loans.dec(),
            _ => {}
        }

        Ok(Receipt {
            sequence,
            digest,
            applied_at: now,
        })
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Submit a signed instruction and wait for its outcome
    pub async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Submit {
                instruction,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> Result<LedgerHandle> {
    let open_loans = storage
        .loans()?
        .iter()
        .filter(|loan| matches!(loan.state, LoanState::Funded | LoanState::Active))
        .count();
    metrics.active_loans.set(open_loans as i64);

    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, clock, metrics)?;

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(LedgerHandle::new(tx))
}
