//! Shared fixtures: a scripted payment gateway and a sled-backed store on a
//! temp dir.
#![allow(dead_code)]

use order_ledger::{
    cart::{Cart, LineItem},
    checkout::TransactionService,
    gateway::{GatewayError, InitializedPayment, PaymentGateway, PaymentMetadata, Verification},
    invoice::InvoiceService,
    money::DEFAULT_WITHDRAWAL_PERCENT,
    store::Store,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub enum Scripted {
    Paid(String), // receipt number
    Abandoned,
    Unreachable,
}

/// Gateway double. Every initialised payment is paid with receipt
/// `RCPT-<n>` unless the script says otherwise.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<HashMap<String, Scripted>>,
    initialized: Mutex<Vec<u64>>,
    counter: Mutex<u32>,
    pub fail_initialize: Mutex<bool>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    pub fn script(&self, reference: &str, outcome: Scripted) {
        self.script
            .lock()
            .unwrap()
            .insert(reference.to_string(), outcome);
    }
    pub fn receipt_for(&self, reference: &str) -> Option<String> {
        match self.script.lock().unwrap().get(reference) {
            Some(Scripted::Paid(receipt)) => Some(receipt.clone()),
            _ => None,
        }
    }
    /// Minor-unit amounts passed to `initialize`, in call order.
    pub fn initialized_amounts(&self) -> Vec<u64> {
        self.initialized.lock().unwrap().clone()
    }
}

impl PaymentGateway for FakeGateway {
    fn initialize(
        &self,
        amount_minor_units: u64,
        _metadata: &PaymentMetadata,
    ) -> Result<InitializedPayment, GatewayError> {
        if *self.fail_initialize.lock().unwrap() {
            return Err(GatewayError::Rejected("Invalid key".into()));
        }
        self.initialized.lock().unwrap().push(amount_minor_units);

        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let reference = format!("ref-{:04}", *counter);
        self.script(&reference, Scripted::Paid(format!("RCPT{:08}", *counter)));

        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.example/{reference}"),
            reference,
        })
    }

    fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        match self.script.lock().unwrap().get(reference).cloned() {
            Some(Scripted::Paid(receipt)) => Ok(Verification {
                success: true,
                receipt_number: Some(receipt),
                status: "success".into(),
            }),
            Some(Scripted::Abandoned) => Ok(Verification {
                success: false,
                receipt_number: None,
                status: "abandoned".into(),
            }),
            Some(Scripted::Unreachable) => Err(GatewayError::InvalidResponse(
                "operation timed out".into(),
            )),
            None => Err(GatewayError::Rejected("Transaction reference not found".into())),
        }
    }
}

pub struct Harness {
    pub store: Arc<Store>,
    pub gateway: Arc<FakeGateway>,
    pub transactions: TransactionService,
    pub invoices: InvoiceService,
    _dir: TempDir,
}

// Sled uses file-based locking, so each test gets its own database in a temp dir.
pub fn harness() -> anyhow::Result<Harness> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(Store::open(dir.path().join("ledger.db"))?);
    let gateway = FakeGateway::new();

    Ok(Harness {
        transactions: TransactionService::new(store.clone(), gateway.clone()),
        invoices: InvoiceService::new(store.clone(), DEFAULT_WITHDRAWAL_PERCENT)?,
        store,
        gateway,
        _dir: dir,
    })
}

pub fn item(name: &str, quantity: u32, price: Decimal) -> LineItem {
    LineItem::new(name, "test product", "product.png", quantity, price).unwrap()
}

pub fn cart(items: Vec<LineItem>) -> Cart {
    Cart::from(items)
}
