//! Transaction lifecycle: checkout, payment verification, recording and
//! receipt validation
//!
//! A sale moves through `Draft -> AwaitingPayment -> Verified -> Recorded ->
//! Validated`. [`TransactionService`] holds the individual operations; the
//! [`Checkout`] value drives one sale through them in order and refuses
//! out-of-order steps.
use super::cart::Cart;
use super::error::{LedgerError, LedgerResult};
use super::gateway::{PaymentGateway, PaymentMetadata};
use super::money;
use super::record::{TimeStamp, Transaction, TransactionStatus};
use super::store::{Store, abort};
use super::utils::{TRANSACTION_HRP, new_record_id};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub payment_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Draft,
    AwaitingPayment(PaymentLink),
    Verified {
        reference: String,
        receipt_number: String,
    },
    Recorded {
        transaction_id: String,
    },
    Validated {
        transaction_id: String,
    },
}

pub struct TransactionService {
    store: Arc<Store>,
    gateway: Arc<dyn PaymentGateway>,
}

impl TransactionService {
    pub fn new(store: Arc<Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Ask the gateway for a payable link covering `total_amount`.
    pub fn initiate_payment(&self, cart: &Cart, total_amount: Decimal) -> LedgerResult<PaymentLink> {
        if cart.is_empty() {
            return Err(LedgerError::InvalidInput("cart is empty".into()));
        }
        let minor_units = money::to_minor_units(total_amount)?;
        let metadata = PaymentMetadata {
            products: cart.items().to_vec(),
        };

        let payment = self
            .gateway
            .initialize(minor_units, &metadata)
            .map_err(|e| LedgerError::Gateway(e.to_string()))?;

        if payment.reference.trim().is_empty() {
            return Err(LedgerError::Gateway("gateway returned no reference".into()));
        }
        info!(reference = %payment.reference, amount = %total_amount, "payment initialised");

        Ok(PaymentLink {
            payment_url: payment.authorization_url,
            reference: payment.reference,
        })
    }

    /// Returns the gateway receipt number once the payment reports success.
    pub fn verify_payment(&self, reference: &str) -> LedgerResult<String> {
        if reference.trim().is_empty() {
            return Err(LedgerError::InvalidInput("reference code is empty".into()));
        }

        let verification = self.gateway.verify(reference).map_err(|e| {
            warn!(reference, error = %e, "payment verification failed");
            LedgerError::VerificationFailed(e.to_string())
        })?;

        if !verification.success {
            warn!(reference, status = %verification.status, "payment not successful");
            return Err(LedgerError::VerificationFailed(format!(
                "gateway reported status {}",
                verification.status
            )));
        }

        match verification.receipt_number {
            Some(receipt) if !receipt.is_empty() => Ok(receipt),
            _ => Err(LedgerError::VerificationFailed(
                "gateway reported success without a receipt number".into(),
            )),
        }
    }

    /// Persist a verified sale as a Completed, unvalidated transaction.
    ///
    /// The stored amount is the checkout total net of the service fee. A
    /// reference code can only ever be recorded once.
    pub fn record_transaction(
        &self,
        cart: &Cart,
        reference_code: &str,
        receipt_number: &str,
        service_fee: Decimal,
        delivery_fee: Decimal,
    ) -> LedgerResult<Transaction> {
        if reference_code.trim().is_empty() || receipt_number.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "reference code and receipt number are required".into(),
            ));
        }
        let amount = money::checkout_total(cart.items(), service_fee, delivery_fee)? - service_fee;

        let tx = Transaction {
            id: new_record_id(TRANSACTION_HRP)?,
            reference_code: reference_code.to_string(),
            receipt_number: receipt_number.to_string(),
            transaction_date: TimeStamp::new(),
            amount,
            service_fee,
            delivery_fee,
            products: cart.items().to_vec(),
            status: TransactionStatus::Completed,
            validated: false,
        };

        self.store.run_atomic(|scope| {
            scope.claim_reference(&tx.reference_code, &tx.id)?;
            scope.put_transaction(&tx)
        })?;
        info!(transaction_id = %tx.id, reference = %tx.reference_code, amount = %tx.amount, "transaction recorded");

        Ok(tx)
    }

    /// Store a transaction created outside checkout. It rests in Pending.
    pub fn import_transaction(
        &self,
        reference_code: &str,
        receipt_number: &str,
        amount: Decimal,
        transaction_date: TimeStamp,
    ) -> LedgerResult<Transaction> {
        let amount = money::ensure_non_negative("amount", amount)?;
        let tx = Transaction {
            id: new_record_id(TRANSACTION_HRP)?,
            reference_code: reference_code.to_string(),
            receipt_number: receipt_number.to_string(),
            transaction_date,
            amount,
            service_fee: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            products: vec![],
            status: TransactionStatus::Pending,
            validated: false,
        };

        self.store.run_atomic(|scope| {
            scope.claim_reference(&tx.reference_code, &tx.id)?;
            scope.put_transaction(&tx)
        })?;
        info!(transaction_id = %tx.id, "pending transaction imported");

        Ok(tx)
    }

    /// Check a teller-entered receipt number against the gateway's.
    ///
    /// Only an exact match flips `validated`; anything else leaves the record
    /// untouched.
    pub fn validate_receipt(&self, transaction_id: &str, submitted: &str) -> LedgerResult<Transaction> {
        let current = self.store.get_transaction(transaction_id)?;
        ensure_validatable(&current)?;

        let gateway_receipt = self.verify_payment(&current.reference_code)?;
        if gateway_receipt != submitted {
            warn!(transaction_id, "submitted receipt does not match gateway receipt");
            return Err(LedgerError::ReceiptMismatch);
        }

        let validated = self.store.run_atomic(|scope| {
            let Some(mut tx) = scope.get_transaction(transaction_id)? else {
                return abort(LedgerError::InvalidState(format!(
                    "transaction {transaction_id} no longer exists"
                )));
            };
            if tx.reference_code != current.reference_code {
                return abort(LedgerError::InvalidState(format!(
                    "transaction {transaction_id} changed during validation"
                )));
            }
            if let Err(e) = ensure_validatable(&tx) {
                return abort(e);
            }
            tx.receipt_number = gateway_receipt.clone();
            tx.validated = true;
            scope.put_transaction(&tx)?;
            Ok(tx)
        })?;
        info!(transaction_id, "receipt validated");

        Ok(validated)
    }

    pub fn get_transaction(&self, id: &str) -> LedgerResult<Transaction> {
        self.store.get_transaction(id)
    }

    /// All transactions, or only those in `status`.
    pub fn list_transactions(&self, status: Option<TransactionStatus>) -> LedgerResult<Vec<Transaction>> {
        let mut all = self.store.list_transactions()?;
        if let Some(status) = status {
            all.retain(|tx| tx.status == status);
        }
        Ok(all)
    }

    /// Dashboard totals over every stored transaction.
    pub fn summary(&self) -> LedgerResult<TransactionSummary> {
        TransactionSummary::from_transactions(&self.store.list_transactions()?)
    }
}

/// Amount totals shown on the overview and transactions pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub pending: usize,
    pub completed: usize,
    pub invoiced: usize,
    /// Validated transactions, whatever their status.
    pub total_verified: Decimal,
    /// Completed transactions still waiting for receipt validation.
    pub total_unverified: Decimal,
    /// Completed and validated, the amount the next invoice would cover.
    pub total_invoiceable: Decimal,
    pub total_earned: Decimal,
}

impl TransactionSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> LedgerResult<Self> {
        let mut summary = Self::default();
        for tx in transactions {
            match tx.status {
                TransactionStatus::Pending => summary.pending += 1,
                TransactionStatus::Completed => summary.completed += 1,
                TransactionStatus::Invoiced => summary.invoiced += 1,
            }
            summary.total_earned = add(summary.total_earned, tx.amount)?;
            if tx.validated {
                summary.total_verified = add(summary.total_verified, tx.amount)?;
            }
            if tx.status == TransactionStatus::Completed && !tx.validated {
                summary.total_unverified = add(summary.total_unverified, tx.amount)?;
            }
            if tx.is_invoiceable() {
                summary.total_invoiceable = add(summary.total_invoiceable, tx.amount)?;
            }
        }
        Ok(summary)
    }
}

fn add(acc: Decimal, amount: Decimal) -> LedgerResult<Decimal> {
    acc.checked_add(amount)
        .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))
}

fn ensure_validatable(tx: &Transaction) -> LedgerResult<()> {
    if tx.status != TransactionStatus::Completed {
        return Err(LedgerError::InvalidState(format!(
            "transaction {} is {:?}, only Completed transactions can be validated",
            tx.id, tx.status
        )));
    }
    if tx.validated {
        return Err(LedgerError::InvalidState(format!(
            "transaction {} is already validated",
            tx.id
        )));
    }
    Ok(())
}

/// One sale driven from cart to validated transaction.
#[derive(Debug, Clone)]
pub struct Checkout {
    cart: Cart,
    service_fee: Decimal,
    delivery_fee: Decimal,
    state: CheckoutState,
}

impl Checkout {
    pub fn new(cart: Cart, service_fee: Decimal, delivery_fee: Decimal) -> LedgerResult<Self> {
        if cart.is_empty() {
            return Err(LedgerError::InvalidInput("cart is empty".into()));
        }
        Ok(Self {
            cart,
            service_fee: money::ensure_non_negative("service fee", service_fee)?,
            delivery_fee: money::ensure_non_negative("delivery fee", delivery_fee)?,
            state: CheckoutState::Draft,
        })
    }
    pub fn state(&self) -> &CheckoutState {
        &self.state
    }
    pub fn cart(&self) -> &Cart {
        &self.cart
    }
    pub fn total(&self) -> LedgerResult<Decimal> {
        money::checkout_total(self.cart.items(), self.service_fee, self.delivery_fee)
    }
    /// The delivery fee is editable until a payment link exists.
    pub fn set_delivery_fee(&mut self, fee: Decimal) -> LedgerResult<()> {
        self.expect_state("change the delivery fee", |s| matches!(s, CheckoutState::Draft))?;
        self.delivery_fee = money::ensure_non_negative("delivery fee", fee)?;
        Ok(())
    }

    /// Draft -> AwaitingPayment
    pub fn begin_payment(&mut self, service: &TransactionService) -> LedgerResult<PaymentLink> {
        self.expect_state("start payment", |s| matches!(s, CheckoutState::Draft))?;

        let link = service.initiate_payment(&self.cart, self.total()?)?;
        self.state = CheckoutState::AwaitingPayment(link.clone());
        Ok(link)
    }

    /// AwaitingPayment -> Verified -> Recorded. A checkout left in Verified by
    /// a failed write resumes at recording.
    pub fn confirm_payment(&mut self, service: &TransactionService) -> LedgerResult<Transaction> {
        if let CheckoutState::AwaitingPayment(link) = &self.state {
            let reference = link.reference.clone();
            let receipt_number = service.verify_payment(&reference)?;
            self.state = CheckoutState::Verified {
                reference,
                receipt_number,
            };
        }

        let CheckoutState::Verified {
            reference,
            receipt_number,
        } = &self.state
        else {
            return Err(self.wrong_state("confirm payment"));
        };

        let tx = service.record_transaction(
            &self.cart,
            reference,
            receipt_number,
            self.service_fee,
            self.delivery_fee,
        )?;
        self.state = CheckoutState::Recorded {
            transaction_id: tx.id.clone(),
        };
        Ok(tx)
    }

    /// Recorded -> Validated
    pub fn validate(&mut self, service: &TransactionService, submitted: &str) -> LedgerResult<Transaction> {
        let CheckoutState::Recorded { transaction_id } = &self.state else {
            return Err(self.wrong_state("validate the receipt"));
        };

        let tx = service.validate_receipt(transaction_id, submitted)?;
        self.state = CheckoutState::Validated {
            transaction_id: tx.id.clone(),
        };
        Ok(tx)
    }

    fn expect_state(&self, action: &str, allowed: impl Fn(&CheckoutState) -> bool) -> LedgerResult<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(self.wrong_state(action))
        }
    }

    fn wrong_state(&self, action: &str) -> LedgerError {
        LedgerError::InvalidState(format!("cannot {action} while checkout is {:?}", self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::LineItem;
    use crate::gateway::{GatewayError, InitializedPayment, Verification};
    use rust_decimal_macros::dec;

    #[test]
    fn empty_cart_cannot_checkout() {
        assert!(matches!(
            Checkout::new(Cart::new(), dec!(5), dec!(0)),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn delivery_fee_editable_in_draft() {
        let mut cart = Cart::new();
        cart.add(LineItem::new("Bread", "", "", 2, dec!(60)).unwrap());
        let mut checkout = Checkout::new(cart, dec!(5), dec!(0)).unwrap();

        checkout.set_delivery_fee(dec!(150)).unwrap();

        assert_eq!(checkout.total().unwrap(), dec!(275));
        assert!(checkout.set_delivery_fee(dec!(-1)).is_err());
    }

    struct Unreachable;

    impl PaymentGateway for Unreachable {
        fn initialize(&self, _: u64, _: &PaymentMetadata) -> Result<InitializedPayment, GatewayError> {
            Err(GatewayError::InvalidResponse("offline".into()))
        }
        fn verify(&self, _: &str) -> Result<Verification, GatewayError> {
            Err(GatewayError::InvalidResponse("offline".into()))
        }
    }

    fn service() -> TransactionService {
        TransactionService::new(Arc::new(Store::temporary().unwrap()), Arc::new(Unreachable))
    }

    fn stored(store: &Store, reference: &str, amount: Decimal, status: TransactionStatus, validated: bool) {
        store
            .create_transaction(Transaction {
                id: String::new(),
                reference_code: reference.into(),
                receipt_number: "R".into(),
                transaction_date: TimeStamp::new(),
                amount,
                service_fee: dec!(5),
                delivery_fee: dec!(0),
                products: vec![],
                status,
                validated,
            })
            .unwrap();
    }

    #[test]
    fn validate_from_draft_is_refused() {
        let mut cart = Cart::new();
        cart.add(LineItem::new("Bread", "", "", 1, dec!(60)).unwrap());
        let mut checkout = Checkout::new(cart, dec!(5), dec!(0)).unwrap();

        let res = checkout.validate(&service(), "RCPT");

        assert!(matches!(res, Err(LedgerError::InvalidState(_))));
        assert_eq!(checkout.state(), &CheckoutState::Draft);
    }

    #[test]
    fn summary_splits_by_status_and_validation() {
        let service = service();
        stored(&service.store, "ref-1", dec!(400), TransactionStatus::Completed, true);
        stored(&service.store, "ref-2", dec!(250.50), TransactionStatus::Completed, false);
        stored(&service.store, "ref-3", dec!(100), TransactionStatus::Invoiced, true);
        stored(&service.store, "ref-4", dec!(20), TransactionStatus::Pending, false);

        let summary = service.summary().unwrap();

        assert_eq!((summary.pending, summary.completed, summary.invoiced), (1, 2, 1));
        assert_eq!(summary.total_verified, dec!(500));
        assert_eq!(summary.total_unverified, dec!(250.50));
        assert_eq!(summary.total_invoiceable, dec!(400));
        assert_eq!(summary.total_earned, dec!(770.50));
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        assert_eq!(service().summary().unwrap(), TransactionSummary::default());
    }

    #[test]
    fn list_filters_by_status() {
        let service = service();
        stored(&service.store, "ref-1", dec!(10), TransactionStatus::Completed, false);
        stored(&service.store, "ref-2", dec!(20), TransactionStatus::Pending, false);
        stored(&service.store, "ref-3", dec!(30), TransactionStatus::Completed, true);

        let completed = service.list_transactions(Some(TransactionStatus::Completed)).unwrap();

        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|tx| tx.status == TransactionStatus::Completed));
        assert!(service.list_transactions(Some(TransactionStatus::Invoiced)).unwrap().is_empty());
        assert_eq!(service.list_transactions(None).unwrap().len(), 3);
    }
}
