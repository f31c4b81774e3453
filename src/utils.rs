//! Record identifiers

use super::error::{LedgerError, LedgerResult};
use bech32::Bech32m;
use uuid7::uuid7;

pub const TRANSACTION_HRP: &str = "txn";
pub const INVOICE_HRP: &str = "inv";

// construct a unique record id then encode using bech32
pub fn new_record_id(hrp: &str) -> LedgerResult<String> {
    let hrp = bech32::Hrp::parse(hrp)
        .map_err(|e| LedgerError::InvalidInput(format!("bad id prefix {hrp:?}: {e}")))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| LedgerError::Codec(e.to_string()))
}
