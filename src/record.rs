//! Persisted documents: transactions and invoices
use super::cart::LineItem;
use super::error::LedgerResult;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    #[n(0)]
    Pending, // imported, not produced by checkout
    #[n(1)]
    Completed,
    #[n(2)]
    Invoiced,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    #[n(0)]
    pub id: String, // bech32 `txn1...`
    #[n(1)]
    pub reference_code: String,
    #[n(2)]
    pub receipt_number: String,
    #[n(3)]
    pub transaction_date: TimeStamp,
    #[n(4)]
    #[cbor(with = "decimal")]
    pub amount: Decimal, // checkout total minus service fee
    #[n(5)]
    #[cbor(with = "decimal")]
    pub service_fee: Decimal,
    #[n(6)]
    #[cbor(with = "decimal")]
    pub delivery_fee: Decimal,
    #[n(7)]
    pub products: Vec<LineItem>,
    #[n(8)]
    pub status: TransactionStatus,
    #[n(9)]
    pub validated: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    #[n(0)]
    pub id: String, // bech32 `inv1...`
    #[n(1)]
    pub created_at: TimeStamp,
    #[n(2)]
    pub status: InvoiceStatus,
    #[n(3)]
    pub transaction_ids: Vec<String>,
    #[n(4)]
    pub reference_codes: Vec<String>, // index-aligned with transaction_ids
    #[n(5)]
    #[cbor(with = "decimal")]
    pub total_amount: Decimal,
    #[n(6)]
    #[cbor(with = "decimal")]
    pub net_amount: Decimal,
    #[n(7)]
    #[cbor(with = "decimal")]
    pub transaction_cost: Decimal,
    #[n(8)]
    pub approved_by: Option<String>,
    #[n(9)]
    pub approved_at: Option<TimeStamp>,
}

/// Fields a plain update may touch. `None` leaves the stored value as is.
#[derive(Debug, Default, Clone)]
pub struct TransactionPatch {
    pub status: Option<TransactionStatus>,
    pub validated: Option<bool>,
    pub receipt_number: Option<String>,
}

/// UTC instant stored as `[seconds, subsecond nanos]`, so any date chrono
/// can represent survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` for dates that don't exist, e.g. February 30th.
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl Transaction {
    /// Eligible for the next invoice run.
    pub fn is_invoiceable(&self) -> bool {
        self.status == TransactionStatus::Completed && self.validated
    }
    pub fn apply(&mut self, patch: &TransactionPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(validated) = patch.validated {
            self.validated = validated;
        }
        if let Some(receipt) = &patch.receipt_number {
            self.receipt_number = receipt.clone();
        }
    }
    pub fn to_cbor(&self) -> LedgerResult<Vec<u8>> {
        Ok(minicbor::to_vec(self)?)
    }
    pub fn from_cbor(bytes: &[u8]) -> LedgerResult<Self> {
        Ok(minicbor::decode(bytes)?)
    }
}

impl Invoice {
    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }
    pub fn to_cbor(&self) -> LedgerResult<Vec<u8>> {
        Ok(minicbor::to_vec(self)?)
    }
    pub fn from_cbor(bytes: &[u8]) -> LedgerResult<Self> {
        Ok(minicbor::decode(bytes)?)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?
            .i64(self.0.timestamp())?
            .u32(self.0.timestamp_subsec_nanos())?
            .ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message("timestamp must be [secs, nanos]"));
        }
        let secs = d.i64()?;
        let nanos = d.u32()?;

        DateTime::from_timestamp(secs, nanos)
            .map(Self)
            .ok_or_else(|| minicbor::decode::Error::message("timestamp out of range"))
    }
}

/// CBOR codec for `Decimal` fields, stored as their canonical string form.
pub mod decimal {
    use rust_decimal::Decimal;

    pub fn encode<C, W: minicbor::encode::Write>(
        value: &Decimal,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&value.to_string())?.ok()
    }

    pub fn decode<'b, C>(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> Result<Decimal, minicbor::decode::Error> {
        d.str()?
            .parse()
            .map_err(|_| minicbor::decode::Error::message("failed to parse decimal amount"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Transaction {
        Transaction {
            id: "txn1test".into(),
            reference_code: "ref-001".into(),
            receipt_number: "AB1234567890".into(),
            transaction_date: TimeStamp::new(),
            amount: dec!(320.50),
            service_fee: dec!(5),
            delivery_fee: dec!(0),
            products: vec![],
            status: TransactionStatus::Completed,
            validated: false,
        }
    }

    #[test]
    fn transaction_cbor_roundtrip() {
        let original = sample();

        let decoded = Transaction::from_cbor(&original.to_cbor().unwrap()).unwrap();

        assert_eq!(original, decoded);
        assert_eq!(decoded.amount.to_string(), "320.50");
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut tx = sample();
        tx.apply(&TransactionPatch {
            validated: Some(true),
            ..Default::default()
        });

        assert!(tx.validated);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.receipt_number, "AB1234567890");
        assert!(tx.is_invoiceable());
    }

    #[test]
    fn timestamp_keeps_subsecond_precision() {
        let mut tx = sample();
        tx.transaction_date = DateTime::from_timestamp(1_718_447_400, 123_456_789)
            .unwrap()
            .into();

        let decoded = Transaction::from_cbor(&tx.to_cbor().unwrap()).unwrap();

        assert_eq!(decoded.transaction_date, tx.transaction_date);
        assert_eq!(decoded.transaction_date.as_datetime().timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn timestamp_beyond_nanosecond_range_roundtrips() {
        let far = TimeStamp::from_ymd_hms(2400, 1, 1, 0, 0, 0).unwrap();

        let bytes = minicbor::to_vec(far).unwrap();

        assert_eq!(minicbor::decode::<TimeStamp>(&bytes).unwrap(), far);
    }

    #[test]
    fn invoiced_is_not_invoiceable() {
        let mut tx = sample();
        tx.validated = true;
        tx.status = TransactionStatus::Invoiced;

        assert!(!tx.is_invoiceable());
    }
}
