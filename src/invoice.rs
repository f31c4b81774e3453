//! Invoice lifecycle: batching validated transactions and approving payouts
//!
//! Both compound operations run inside one store transaction. Creating an
//! invoice re-checks every named transaction against the eligibility rule
//! (`Completed && validated`) and recomputes the totals from that same
//! snapshot, so a transaction that changed after the draft was taken aborts
//! the whole invoice. Approval is terminal and deletes the transactions.
use super::error::{LedgerError, LedgerResult};
use super::money;
use super::record::{Invoice, InvoiceStatus, TimeStamp, TransactionStatus};
use super::session::Caller;
use super::store::{Store, abort};
use super::utils::{INVOICE_HRP, new_record_id};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Totals for the transactions currently eligible for invoicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub transaction_ids: Vec<String>,
    pub reference_codes: Vec<String>,
    pub total_amount: Decimal,
    pub transaction_cost: Decimal,
    pub net_amount: Decimal,
}

pub struct InvoiceService {
    store: Arc<Store>,
    withdrawal_percent: Decimal,
}

impl InvoiceDraft {
    pub fn is_empty(&self) -> bool {
        self.transaction_ids.is_empty()
    }
}

impl InvoiceService {
    pub fn new(store: Arc<Store>, withdrawal_percent: Decimal) -> LedgerResult<Self> {
        let withdrawal_percent = money::ensure_non_negative("withdrawal percent", withdrawal_percent)?;
        Ok(Self {
            store,
            withdrawal_percent,
        })
    }

    pub fn withdrawal_percent(&self) -> Decimal {
        self.withdrawal_percent
    }

    /// Snapshot of every Completed, validated transaction with computed totals.
    pub fn draft_invoice(&self) -> LedgerResult<InvoiceDraft> {
        let eligible: Vec<_> = self
            .store
            .list_transactions()?
            .into_iter()
            .filter(|tx| tx.is_invoiceable())
            .collect();

        let total_amount = eligible.iter().try_fold(Decimal::ZERO, |acc, tx| {
            acc.checked_add(tx.amount)
                .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))
        })?;
        let transaction_cost = money::invoice_transaction_cost(total_amount, self.withdrawal_percent)?;
        let net_amount = money::invoice_net(total_amount, transaction_cost)?;

        Ok(InvoiceDraft {
            transaction_ids: eligible.iter().map(|tx| tx.id.clone()).collect(),
            reference_codes: eligible.iter().map(|tx| tx.reference_code.clone()).collect(),
            total_amount,
            transaction_cost,
            net_amount,
        })
    }

    /// Create a Pending invoice and mark its transactions Invoiced, atomically.
    pub fn create_invoice(
        &self,
        transaction_ids: &[String],
        reference_codes: &[String],
        total_amount: Decimal,
        net_amount: Decimal,
    ) -> LedgerResult<Invoice> {
        if transaction_ids.is_empty() {
            return Err(LedgerError::InvalidInput("no transactions to invoice".into()));
        }
        if transaction_ids.len() != reference_codes.len() {
            return Err(LedgerError::InvalidInput(format!(
                "{} transaction ids but {} reference codes",
                transaction_ids.len(),
                reference_codes.len()
            )));
        }
        let unique: HashSet<&String> = transaction_ids.iter().collect();
        if unique.len() != transaction_ids.len() {
            return Err(LedgerError::InvalidInput("transaction ids repeat".into()));
        }
        money::ensure_non_negative("total amount", total_amount)?;
        money::ensure_non_negative("net amount", net_amount)?;

        let invoice_id = new_record_id(INVOICE_HRP)?;
        let percent = self.withdrawal_percent;

        let invoice = self.store.run_atomic(|scope| {
            let mut snapshot = Vec::with_capacity(transaction_ids.len());
            for (id, reference) in transaction_ids.iter().zip(reference_codes) {
                let Some(tx) = scope.get_transaction(id)? else {
                    return abort(LedgerError::InvalidState(format!(
                        "transaction {id} does not exist"
                    )));
                };
                if !tx.is_invoiceable() {
                    return abort(LedgerError::InvalidState(format!(
                        "transaction {id} is {:?} (validated: {}) and cannot be invoiced",
                        tx.status, tx.validated
                    )));
                }
                if &tx.reference_code != reference {
                    return abort(LedgerError::InvalidInput(format!(
                        "reference {reference} does not belong to transaction {id}"
                    )));
                }
                snapshot.push(tx);
            }

            let computed_total: Decimal = snapshot.iter().map(|tx| tx.amount).sum();
            if computed_total != total_amount {
                return abort(LedgerError::InvalidInput(format!(
                    "total {total_amount} does not match transactions ({computed_total})"
                )));
            }
            let costs = money::invoice_transaction_cost(computed_total, percent)
                .and_then(|cost| money::invoice_net(computed_total, cost).map(|net| (cost, net)));
            let (transaction_cost, computed_net) = match costs {
                Ok(values) => values,
                Err(e) => return abort(e),
            };
            if computed_net != net_amount {
                return abort(LedgerError::InvalidInput(format!(
                    "net {net_amount} does not match expected {computed_net}"
                )));
            }

            for mut tx in snapshot {
                tx.status = TransactionStatus::Invoiced;
                scope.put_transaction(&tx)?;
            }

            let invoice = Invoice {
                id: invoice_id.clone(),
                created_at: TimeStamp::new(),
                status: InvoiceStatus::Pending,
                transaction_ids: transaction_ids.to_vec(),
                reference_codes: reference_codes.to_vec(),
                total_amount: computed_total,
                net_amount: computed_net,
                transaction_cost,
                approved_by: None,
                approved_at: None,
            };
            scope.put_invoice(&invoice)?;
            Ok(invoice)
        })?;
        info!(invoice_id = %invoice.id, transactions = invoice.transaction_ids.len(), total = %invoice.total_amount, "invoice created");

        Ok(invoice)
    }

    /// Approve a Pending invoice and delete its transactions, atomically.
    ///
    /// `transaction_ids` must name exactly the invoice's transactions. Only a
    /// super-admin may approve. A second approval fails with
    /// [`LedgerError::InvalidState`] and deletes nothing.
    pub fn approve_invoice(
        &self,
        caller: &Caller,
        invoice_id: &str,
        transaction_ids: &[String],
    ) -> LedgerResult<Invoice> {
        if !caller.can_approve_invoices() {
            warn!(caller = %caller.id, role = %caller.role, invoice_id, "approval refused");
            return Err(LedgerError::Forbidden("approve invoices".into()));
        }
        if invoice_id.trim().is_empty() || transaction_ids.is_empty() {
            return Err(LedgerError::InvalidInput(
                "invoice id and transaction ids are required".into(),
            ));
        }

        let invoice = self.store.run_atomic(|scope| {
            let Some(mut invoice) = scope.get_invoice(invoice_id)? else {
                return abort(LedgerError::InvalidState(format!(
                    "invoice {invoice_id} does not exist"
                )));
            };
            if !invoice.is_pending() {
                return abort(LedgerError::InvalidState(format!(
                    "invoice {invoice_id} is not in Pending status"
                )));
            }
            if let Some(stray) = transaction_ids
                .iter()
                .find(|id| !invoice.transaction_ids.contains(*id))
            {
                return abort(LedgerError::InvalidInput(format!(
                    "transaction {stray} is not part of invoice {invoice_id}"
                )));
            }
            // approval covers the whole invoice
            let named: HashSet<&String> = transaction_ids.iter().collect();
            if let Some(missing) = invoice.transaction_ids.iter().find(|id| !named.contains(id)) {
                return abort(LedgerError::InvalidInput(format!(
                    "approval of invoice {invoice_id} must include transaction {missing}"
                )));
            }

            invoice.status = InvoiceStatus::Approved;
            invoice.approved_by = Some(caller.id.clone());
            invoice.approved_at = Some(TimeStamp::new());
            scope.put_invoice(&invoice)?;

            for id in transaction_ids {
                scope.delete_transaction(id)?;
            }
            Ok(invoice)
        })?;
        info!(invoice_id, approved_by = %caller.id, deleted = transaction_ids.len(), "invoice approved");

        Ok(invoice)
    }

    pub fn get_invoice(&self, id: &str) -> LedgerResult<Invoice> {
        self.store.get_invoice(id)
    }

    pub fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        self.store.list_invoices()
    }
}
