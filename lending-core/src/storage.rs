//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `registry` - Protocol registry (single key)
//! - `reputations` - Reputations (key: owner)
//! - `loans` - Loans (key: borrower || loan_id)
//! - `escrows` - Escrows (key: borrower || loan_id)
//! - `balances` - Spendable balances (key: owner)
//! - `events` - Append-only event log (key: sequence)
//! - `digests` - Applied instruction digests (key: digest)
//! - `meta` - Ledger metadata (last sequence)
//!
//! All values are bincode-encoded. Writes only happen through [`Storage::commit`],
//! which lands a whole changeset and its event in one `WriteBatch`.

use crate::{
    error::{Error, Result},
    escrow::Escrow,
    events::LedgerEvent,
    lifecycle::{Changeset, StateReader},
    loan::Loan,
    registry::ProtocolRegistry,
    reputation::Reputation,
    types::{Amount, Identity, LoanKey},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Column family names
const CF_REGISTRY: &str = "registry";
const CF_REPUTATIONS: &str = "reputations";
const CF_LOANS: &str = "loans";
const CF_ESCROWS: &str = "escrows";
const CF_BALANCES: &str = "balances";
const CF_EVENTS: &str = "events";
const CF_DIGESTS: &str = "digests";
const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_REGISTRY,
    CF_REPUTATIONS,
    CF_LOANS,
    CF_ESCROWS,
    CF_BALANCES,
    CF_EVENTS,
    CF_DIGESTS,
    CF_META,
];

const REGISTRY_KEY: &[u8] = b"registry";
const LAST_SEQUENCE_KEY: &[u8] = b"last_sequence";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    path: PathBuf,
    sync_writes: bool,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            column_families = COLUMN_FAMILIES.len(),
            "Opened RocksDB"
        );

        Ok(Self {
            db: Arc::new(db),
            path: path.clone(),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            // Log is written once and rarely read
            CF_EVENTS => opts.set_compression_type(rocksdb::DBCompressionType::Zstd),
            // Point lookups on every submission
            CF_DIGESTS => {
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            _ => opts.set_compression_type(rocksdb::DBCompressionType::Lz4),
        }
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(bincode::deserialize(&value)?);
        }
        Ok(values)
    }

    // Reads

    /// All loans, ordered by borrower then loan id
    pub fn loans(&self) -> Result<Vec<Loan>> {
        self.scan(CF_LOANS, &[])
    }

    /// Loans of one borrower
    pub fn loans_of(&self, borrower: &Identity) -> Result<Vec<Loan>> {
        self.scan(CF_LOANS, borrower.as_bytes())
    }

    /// All reputations
    pub fn reputations(&self) -> Result<Vec<Reputation>> {
        self.scan(CF_REPUTATIONS, &[])
    }

    /// Up to `limit` events starting at sequence `from`
    pub fn events(&self, from: u64, limit: usize) -> Result<Vec<LedgerEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let start = from.to_be_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start[..], Direction::Forward));

        let mut events = Vec::new();
        for item in iter.take(limit) {
            let (_, value) = item?;
            events.push(bincode::deserialize(&value)?);
        }
        Ok(events)
    }

    /// Sequence of the last committed event (0 when empty)
    pub fn last_sequence(&self) -> Result<u64> {
        Ok(self.get(CF_META, LAST_SEQUENCE_KEY)?.unwrap_or(0))
    }

    /// Whether an instruction with this digest was already applied
    pub fn has_digest(&self, digest: &[u8; 32]) -> Result<bool> {
        let cf = self.cf_handle(CF_DIGESTS)?;
        Ok(self.db.get_pinned_cf(cf, digest)?.is_some())
    }

    // Batch operations (atomic)

    /// Write every record of `changes`, the event and its digest (atomic)
    pub fn commit(&self, changes: &Changeset, event: &LedgerEvent) -> Result<()> {
        let mut batch = WriteBatch::default();

        if let Some(registry) = &changes.registry {
            batch.put_cf(self.cf_handle(CF_REGISTRY)?, REGISTRY_KEY, bincode::serialize(registry)?);
        }

        let cf_reputations = self.cf_handle(CF_REPUTATIONS)?;
        for reputation in &changes.reputations {
            batch.put_cf(
                cf_reputations,
                reputation.owner.as_bytes(),
                bincode::serialize(reputation)?,
            );
        }

        let cf_loans = self.cf_handle(CF_LOANS)?;
        for loan in &changes.loans {
            batch.put_cf(cf_loans, loan.key().to_bytes(), bincode::serialize(loan)?);
        }

        let cf_escrows = self.cf_handle(CF_ESCROWS)?;
        for (key, escrow) in &changes.escrows {
            batch.put_cf(cf_escrows, key.to_bytes(), bincode::serialize(escrow)?);
        }

        let cf_balances = self.cf_handle(CF_BALANCES)?;
        for (owner, balance) in &changes.balances {
            batch.put_cf(cf_balances, owner.as_bytes(), bincode::serialize(balance)?);
        }

        batch.put_cf(
            self.cf_handle(CF_EVENTS)?,
            event.sequence.to_be_bytes(),
            bincode::serialize(event)?,
        );
        batch.put_cf(self.cf_handle(CF_DIGESTS)?, event.digest, event.sequence.to_be_bytes());
        batch.put_cf(
            self.cf_handle(CF_META)?,
            LAST_SEQUENCE_KEY,
            bincode::serialize(&event.sequence)?,
        );

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        tracing::debug!(
            sequence = event.sequence,
            kind = ?event.kind,
            loans = changes.loans.len(),
            balances = changes.balances.len(),
            "Changeset committed"
        );

        Ok(())
    }
}

impl StateReader for Storage {
    fn registry(&self) -> Result<Option<ProtocolRegistry>> {
        self.get(CF_REGISTRY, REGISTRY_KEY)
    }

    fn reputation(&self, owner: &Identity) -> Result<Option<Reputation>> {
        self.get(CF_REPUTATIONS, owner.as_bytes())
    }

    fn loan(&self, key: &LoanKey) -> Result<Option<Loan>> {
        self.get(CF_LOANS, &key.to_bytes())
    }

    fn escrow(&self, key: &LoanKey) -> Result<Escrow> {
        Ok(self.get(CF_ESCROWS, &key.to_bytes())?.unwrap_or_default())
    }

    fn balance(&self, owner: &Identity) -> Result<Amount> {
        Ok(self.get(CF_BALANCES, owner.as_bytes())?.unwrap_or(0))
    }
}
