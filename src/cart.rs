//! Product line items and the in-memory cart a checkout starts from
use super::error::{LedgerError, LedgerResult};
use super::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Also copied onto the transaction record at checkout
#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq,
)]
pub struct LineItem {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub image: String, // url or asset path
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    #[cbor(with = "crate::record::decimal")]
    #[serde(rename = "price")]
    pub unit_price: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl LineItem {
    pub fn new(
        name: &str,
        description: &str,
        image: &str,
        quantity: u32,
        unit_price: Decimal,
    ) -> LedgerResult<Self> {
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("product name is empty".into()));
        }
        if quantity == 0 {
            return Err(LedgerError::InvalidInput(format!(
                "quantity for {name} must be at least 1"
            )));
        }
        let unit_price = money::ensure_non_negative("unit price", unit_price)?;

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            image: image.to_string(),
            quantity,
            unit_price,
        })
    }
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }
    /// Appends a line. Adding the same product twice keeps two lines.
    pub fn add(&mut self, item: LineItem) {
        self.items.push(item);
    }
    pub fn remove(&mut self, index: usize) -> Option<LineItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> LedgerResult<()> {
        if quantity == 0 {
            return Err(LedgerError::InvalidInput("quantity must be at least 1".into()));
        }
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| LedgerError::InvalidInput(format!("no cart line at {index}")))?;
        item.quantity = quantity;
        Ok(())
    }
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn total(&self) -> LedgerResult<Decimal> {
        money::line_total(&self.items)
    }
}

impl From<Vec<LineItem>> for Cart {
    fn from(items: Vec<LineItem>) -> Self {
        Self { items }
    }
}
