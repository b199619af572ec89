//! Default detection
//!
//! One cycle fetches every loan, keeps the `Active` ones whose due date plus
//! the grace period has passed, and submits a `MarkDefault` for each, signed
//! with the oracle key. The ledger re-checks every precondition, so a loan
//! repaid between fetch and submit is rejected there and counted as an error.

use crate::client::ProtocolClient;
use crate::metrics::Metrics;
use crate::{Error, Result};
use lending_core::{
    Clock, Identity, Instruction, KeyPair, Loan, LoanId, LoanState, Receipt, SignedInstruction,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle identifier
    pub cycle_id: Uuid,
    /// Ledger time at cycle start
    pub started_at: Timestamp,
    /// Active loans examined
    pub checked: u64,
    /// Loans found past due date plus grace
    pub detected: u64,
    /// Defaults applied by the ledger
    pub processed: u64,
    /// Fetch and submit failures
    pub errors: u64,
}

impl CycleReport {
    fn new(started_at: Timestamp) -> Self {
        Self {
            cycle_id: Uuid::now_v7(),
            started_at,
            checked: 0,
            detected: 0,
            processed: 0,
            errors: 0,
        }
    }
}

/// Loan past its due date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLoan {
    /// Borrower
    pub borrower: Identity,
    /// Loan id
    pub loan_id: LoanId,
    /// Due date
    pub due_date: Timestamp,
    /// Whole days past due
    pub days_overdue: i64,
}

/// Oracle-side default monitor
pub struct DefaultMonitor {
    client: Arc<dyn ProtocolClient>,
    oracle: KeyPair,
    grace_period_secs: i64,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl fmt::Debug for DefaultMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultMonitor")
            .field("oracle", &self.oracle.identity())
            .field("grace_period_secs", &self.grace_period_secs)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl DefaultMonitor {
    /// Create a monitor signing with `oracle`
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        oracle: KeyPair,
        grace_period_secs: i64,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            oracle,
            grace_period_secs,
            clock,
            metrics,
        }
    }

    /// Oracle identity
    pub fn oracle(&self) -> Identity {
        self.oracle.identity()
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Refuse to run unless our key is the registry's oracle
    pub async fn verify_oracle_authority(&self) -> Result<()> {
        let registry = self.client.fetch_registry().await?;
        let configured = self.oracle.identity();
        if registry.oracle_authority != configured {
            return Err(Error::OracleMismatch {
                expected: registry.oracle_authority,
                configured,
            });
        }
        info!(oracle = %configured.short(), "Oracle authority verified");
        Ok(())
    }

    /// Run one detection cycle; failures are counted, never returned
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = CycleReport::new(now);

        match self.client.fetch_loans().await {
            Ok(loans) => {
                for loan in loans.iter().filter(|l| l.state == LoanState::Active) {
                    report.checked += 1;
                    if !self.is_defaulted(loan, now) {
                        continue;
                    }

                    report.detected += 1;
                    warn!(
                        borrower = %loan.borrower.short(),
                        loan_id = loan.loan_id,
                        due_date = ?loan.due_date,
                        days_overdue = loan.days_overdue(now),
                        "Overdue loan detected"
                    );

                    match self.submit_default(loan).await {
                        Ok(receipt) => {
                            report.processed += 1;
                            info!(
                                borrower = %loan.borrower.short(),
                                loan_id = loan.loan_id,
                                sequence = receipt.sequence,
                                "Loan marked defaulted"
                            );
                        }
                        Err(e) => {
                            report.errors += 1;
                            warn!(
                                borrower = %loan.borrower.short(),
                                loan_id = loan.loan_id,
                                error = %e,
                                "Failed to mark default"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                error!(error = %e, "Failed to fetch loans");
            }
        }

        self.metrics.record_cycle(
            report.processed,
            report.errors,
            started.elapsed().as_secs_f64(),
        );
        info!(
            cycle_id = %report.cycle_id,
            checked = report.checked,
            detected = report.detected,
            processed = report.processed,
            errors = report.errors,
            "Monitor cycle complete"
        );

        report
    }

    /// Active and past `due_date + grace` at `now`
    pub fn is_defaulted(&self, loan: &Loan, now: Timestamp) -> bool {
        loan.is_overdue(now, self.grace_period_secs)
    }

    /// Loans currently Active
    pub async fn active_loan_count(&self) -> Result<usize> {
        let loans = self.client.fetch_loans().await?;
        Ok(loans.iter().filter(|l| l.state == LoanState::Active).count())
    }

    /// Active loans past their due date, grace ignored
    pub async fn overdue_loans(&self) -> Result<Vec<OverdueLoan>> {
        let now = self.clock.now();
        let loans = self.client.fetch_loans().await?;
        Ok(loans
            .iter()
            .filter(|loan| loan.is_overdue(now, 0))
            .filter_map(|loan| {
                loan.due_date.map(|due_date| OverdueLoan {
                    borrower: loan.borrower,
                    loan_id: loan.loan_id,
                    due_date,
                    days_overdue: loan.days_overdue(now),
                })
            })
            .collect())
    }

    async fn submit_default(&self, loan: &Loan) -> Result<Receipt> {
        let signed = SignedInstruction::sign(
            &self.oracle,
            rand::random::<u64>(),
            Instruction::MarkDefault {
                borrower: loan.borrower,
                loan_id: loan.loan_id,
            },
        )?;
        self.client.submit(signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lending_core::{FeeBasis, ManualClock, ProtocolRegistry, Reputation};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeClient {
        registry: ProtocolRegistry,
        loans: Vec<Loan>,
        submitted: Mutex<Vec<SignedInstruction>>,
        fail_fetch: AtomicBool,
        reject_submit: bool,
    }

    impl FakeClient {
        fn new(oracle: Identity, loans: Vec<Loan>) -> Self {
            let authority = Identity::from_bytes([9u8; 32]);
            Self {
                registry: ProtocolRegistry::initialize(
                    authority,
                    oracle,
                    100,
                    FeeBasis::Interest,
                    0,
                )
                .unwrap(),
                loans,
                submitted: Mutex::new(Vec::new()),
                fail_fetch: AtomicBool::new(false),
                reject_submit: false,
            }
        }
    }

    #[async_trait]
    impl ProtocolClient for FakeClient {
        async fn fetch_registry(&self) -> Result<ProtocolRegistry> {
            Ok(self.registry.clone())
        }

        async fn fetch_loans(&self) -> Result<Vec<Loan>> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(lending_core::Error::Concurrency("mailbox closed".into()).into());
            }
            Ok(self.loans.clone())
        }

        async fn submit(&self, instruction: SignedInstruction) -> Result<Receipt> {
            if self.reject_submit {
                return Err(lending_core::Error::InvalidState {
                    loan: "fake".to_string(),
                    expected: LoanState::Active,
                    actual: LoanState::Repaid,
                }
                .into());
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(instruction);
            Ok(Receipt {
                sequence: submitted.len() as u64,
                digest: [0u8; 32],
                applied_at: 0,
            })
        }
    }

    /// Loan with `id`, activated at 0 with the given duration
    fn active_loan(id: LoanId, duration: i64) -> Loan {
        let borrower = Identity::from_bytes([1u8; 32]);
        let reputation = Reputation::new(borrower, 0);
        let mut loan = Loan::request(&reputation, id, 1_000_000, duration, 1500, 0).unwrap();
        loan.fund(Identity::from_bytes([2u8; 32]), 1000, 0).unwrap();
        loan.activate(0).unwrap();
        loan
    }

    fn monitor(
        client: Arc<FakeClient>,
        oracle: KeyPair,
        grace: i64,
        clock: &ManualClock,
    ) -> DefaultMonitor {
        DefaultMonitor::new(
            client,
            oracle,
            grace,
            Arc::new(clock.clone()),
            Metrics::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_cycle_defaults_only_overdue() {
        let oracle = KeyPair::generate();
        let requested = {
            let reputation = Reputation::new(Identity::from_bytes([3u8; 32]), 0);
            Loan::request(&reputation, 9, 1_000, 10, 100, 0).unwrap()
        };
        let client = Arc::new(FakeClient::new(
            oracle.identity(),
            vec![active_loan(1, 100), active_loan(2, 10_000), requested],
        ));
        let clock = ManualClock::new(500);
        let monitor = monitor(client.clone(), oracle, 60, &clock);

        let report = monitor.run_cycle().await;
        assert_eq!(report.checked, 2);
        assert_eq!(report.detected, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(report.started_at, 500);

        let submitted = client.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].verify().is_ok());
        assert!(matches!(
            submitted[0].instruction,
            Instruction::MarkDefault { loan_id: 1, .. }
        ));
        assert_eq!(monitor.metrics().defaults_processed.get(), 1);
    }

    #[tokio::test]
    async fn test_grace_period_boundary() {
        let oracle = KeyPair::generate();
        let client = Arc::new(FakeClient::new(oracle.identity(), vec![active_loan(1, 100)]));
        let clock = ManualClock::new(160);
        let monitor = monitor(client, oracle, 60, &clock);
        let loan = active_loan(1, 100);

        assert!(!monitor.is_defaulted(&loan, 160));
        assert!(monitor.is_defaulted(&loan, 161));
        assert_eq!(monitor.run_cycle().await.detected, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_counts_one_error() {
        let oracle = KeyPair::generate();
        let client = Arc::new(FakeClient::new(oracle.identity(), vec![active_loan(1, 100)]));
        client.fail_fetch.store(true, Ordering::SeqCst);
        let clock = ManualClock::new(10_000);
        let monitor = monitor(client.clone(), oracle, 0, &clock);

        let report = monitor.run_cycle().await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.checked, 0);

        // Recovers on the next cycle
        client.fail_fetch.store(false, Ordering::SeqCst);
        let report = monitor.run_cycle().await;
        assert_eq!(report.processed, 1);
        assert_eq!(monitor.metrics().cycles_total.get(), 2);
    }

    #[tokio::test]
    async fn test_rejected_submit_continues() {
        let oracle = KeyPair::generate();
        let loans = vec![active_loan(1, 10), active_loan(2, 10)];
        let mut client = FakeClient::new(oracle.identity(), loans);
        client.reject_submit = true;
        let clock = ManualClock::new(1_000);
        let monitor = monitor(Arc::new(client), oracle, 0, &clock);

        let report = monitor.run_cycle().await;
        assert_eq!(report.detected, 2);
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 2);
    }

    #[tokio::test]
    async fn test_oracle_mismatch() {
        let oracle = KeyPair::generate();
        let other = KeyPair::generate();
        let client = Arc::new(FakeClient::new(other.identity(), vec![]));
        let clock = ManualClock::new(0);
        let monitor = monitor(client, oracle, 0, &clock);

        let err = monitor.verify_oracle_authority().await.unwrap_err();
        assert!(matches!(
            err,
            Error::OracleMismatch { expected, .. } if expected == other.identity()
        ));
    }

    #[tokio::test]
    async fn test_overdue_listing_ignores_grace() {
        let oracle = KeyPair::generate();
        let client = Arc::new(FakeClient::new(
            oracle.identity(),
            vec![active_loan(1, 100), active_loan(2, 1_000_000)],
        ));
        let clock = ManualClock::new(100 + 2 * 86_400 + 5);
        let monitor = monitor(client, oracle, 10 * 86_400, &clock);

        let overdue = monitor.overdue_loans().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].loan_id, 1);
        assert_eq!(overdue[0].due_date, 100);
        assert_eq!(overdue[0].days_overdue, 2);
        assert_eq!(monitor.active_loan_count().await.unwrap(), 2);
    }
}
