//! Document store for transactions and invoices
//!
//! Each collection lives in its own sled tree keyed by record id, values are
//! CBOR. A third tree, `references`, maps every payment reference code that
//! was ever recorded to the transaction id it produced; entries survive the
//! deletion of the transaction so a paid-out reference can't be recorded twice.
//!
//! Compound operations go through [`Store::run_atomic`], which runs a closure
//! over all three trees inside one sled transaction. Sled re-runs the closure
//! on conflict, so it must not have side effects outside the [`AtomicScope`].
use super::error::{LedgerError, LedgerResult};
use super::record::{Invoice, Transaction, TransactionPatch};
use super::utils::{INVOICE_HRP, TRANSACTION_HRP, new_record_id};
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use std::sync::Arc;
use tracing::debug;

const TRANSACTIONS_TREE: &str = "transactions";
const INVOICES_TREE: &str = "invoices";
const REFERENCES_TREE: &str = "references";

pub type ScopeResult<T> = ConflictableTransactionResult<T, LedgerError>;

/// Aborts the surrounding atomic operation with `err`.
pub fn abort<T>(err: LedgerError) -> ScopeResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub struct Store {
    instance: Arc<sled::Db>,
    transactions: sled::Tree,
    invoices: sled::Tree,
    references: sled::Tree,
}

/// Read/write view over both collections inside one atomic operation.
pub struct AtomicScope<'a> {
    transactions: &'a TransactionalTree,
    invoices: &'a TransactionalTree,
    references: &'a TransactionalTree,
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> LedgerResult<Self> {
        let transactions = instance.open_tree(TRANSACTIONS_TREE)?;
        let invoices = instance.open_tree(INVOICES_TREE)?;
        let references = instance.open_tree(REFERENCES_TREE)?;

        Ok(Self {
            instance,
            transactions,
            invoices,
            references,
        })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> LedgerResult<Self> {
        Self::new(Arc::new(sled::open(path)?))
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> LedgerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(Arc::new(db))
    }

    pub fn flush(&self) -> LedgerResult<()> {
        self.instance.flush()?;
        Ok(())
    }

    /// Runs `f` as a single read-verify-write transaction over the store.
    ///
    /// An abort raised inside `f` is returned as is. A failure to commit is
    /// reported as [`LedgerError::Aborted`].
    pub fn run_atomic<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: Fn(&AtomicScope<'_>) -> ScopeResult<T>,
    {
        let result = (&self.transactions, &self.invoices, &self.references).transaction(
            |(transactions, invoices, references)| -> ScopeResult<T> {
                let scope = AtomicScope {
                    transactions,
                    invoices,
                    references,
                };
                f(&scope)
            },
        );

        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(LedgerError::Aborted(err.to_string())),
        }
    }

    /// Stores `tx` under a fresh id and returns the id. Fails with
    /// [`LedgerError::DuplicateReference`] if its reference was ever recorded.
    pub fn create_transaction(&self, mut tx: Transaction) -> LedgerResult<String> {
        tx.id = new_record_id(TRANSACTION_HRP)?;
        self.run_atomic(|scope| {
            scope.claim_reference(&tx.reference_code, &tx.id)?;
            scope.put_transaction(&tx)
        })?;
        debug!(transaction_id = %tx.id, "transaction stored");

        Ok(tx.id)
    }

    pub fn get_transaction(&self, id: &str) -> LedgerResult<Transaction> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Transaction::from_cbor(&bytes),
            None => Err(not_found("transaction", id)),
        }
    }

    pub fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> LedgerResult<Transaction> {
        self.run_atomic(|scope| {
            let Some(mut tx) = scope.get_transaction(id)? else {
                return abort(not_found("transaction", id));
            };
            tx.apply(patch);
            scope.put_transaction(&tx)?;
            Ok(tx)
        })
    }

    pub fn delete_transaction(&self, id: &str) -> LedgerResult<()> {
        match self.transactions.remove(id.as_bytes())? {
            Some(_) => Ok(()),
            None => Err(not_found("transaction", id)),
        }
    }

    pub fn list_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        self.transactions
            .iter()
            .values()
            .map(|bytes| Transaction::from_cbor(&bytes?))
            .collect()
    }

    /// Transaction id a reference code was recorded under, if any.
    pub fn reference_owner(&self, reference: &str) -> LedgerResult<Option<String>> {
        self.references
            .get(reference.as_bytes())?
            .map(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(|e| LedgerError::Codec(e.to_string()))
            })
            .transpose()
    }

    pub fn create_invoice(&self, mut invoice: Invoice) -> LedgerResult<String> {
        invoice.id = new_record_id(INVOICE_HRP)?;
        self.invoices.insert(invoice.id.as_bytes(), invoice.to_cbor()?)?;

        Ok(invoice.id)
    }

    pub fn get_invoice(&self, id: &str) -> LedgerResult<Invoice> {
        match self.invoices.get(id.as_bytes())? {
            Some(bytes) => Invoice::from_cbor(&bytes),
            None => Err(not_found("invoice", id)),
        }
    }

    pub fn delete_invoice(&self, id: &str) -> LedgerResult<()> {
        match self.invoices.remove(id.as_bytes())? {
            Some(_) => Ok(()),
            None => Err(not_found("invoice", id)),
        }
    }

    /// All invoices in key order. The order is stable within one call.
    pub fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        self.invoices
            .iter()
            .values()
            .map(|bytes| Invoice::from_cbor(&bytes?))
            .collect()
    }
}

impl AtomicScope<'_> {
    pub fn get_transaction(&self, id: &str) -> ScopeResult<Option<Transaction>> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Transaction::from_cbor(&bytes)
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    pub fn put_transaction(&self, tx: &Transaction) -> ScopeResult<()> {
        let bytes = tx.to_cbor().map_err(ConflictableTransactionError::Abort)?;
        self.transactions.insert(tx.id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub fn delete_transaction(&self, id: &str) -> ScopeResult<bool> {
        Ok(self.transactions.remove(id.as_bytes())?.is_some())
    }

    pub fn get_invoice(&self, id: &str) -> ScopeResult<Option<Invoice>> {
        match self.invoices.get(id.as_bytes())? {
            Some(bytes) => Invoice::from_cbor(&bytes)
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    pub fn put_invoice(&self, invoice: &Invoice) -> ScopeResult<()> {
        let bytes = invoice.to_cbor().map_err(ConflictableTransactionError::Abort)?;
        self.invoices.insert(invoice.id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Binds `reference` to `transaction_id`, aborting if it is already bound.
    pub fn claim_reference(&self, reference: &str, transaction_id: &str) -> ScopeResult<()> {
        if self.references.get(reference.as_bytes())?.is_some() {
            return abort(LedgerError::DuplicateReference(reference.to_string()));
        }
        self.references
            .insert(reference.as_bytes(), transaction_id.as_bytes())?;
        Ok(())
    }
}

fn not_found(kind: &str, id: &str) -> LedgerError {
    LedgerError::InvalidState(format!("{kind} {id} does not exist"))
}
