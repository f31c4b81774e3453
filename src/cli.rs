use clap::{Parser, Subcommand};
use order_ledger::cart::LineItem;
use order_ledger::money;
use order_ledger::record::TransactionStatus;
use order_ledger::session::Role;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "order-ledger")]
#[command(about = "Checkout, receipt validation and invoicing for the storefront", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a payment link for a cart
    Checkout {
        /// Cart line as NAME:QUANTITY:PRICE, repeatable
        #[arg(short, long = "item", value_parser = parse_item, required = true)]
        items: Vec<LineItem>,
        /// Overrides the configured delivery fee
        #[arg(long, value_parser = parse_money)]
        delivery_fee: Option<Decimal>,
    },

    /// Verify a paid reference and record the sale
    Confirm {
        /// Payment reference returned by `checkout`
        reference: String,
        #[arg(short, long = "item", value_parser = parse_item, required = true)]
        items: Vec<LineItem>,
        #[arg(long, value_parser = parse_money)]
        delivery_fee: Option<Decimal>,
    },

    /// Transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Invoice commands
    #[command(subcommand)]
    Invoice(InvoiceCommands),
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// List transactions, receipts masked until validated
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        /// Only show pending, completed or invoiced transactions
        #[arg(long, value_parser = parse_status)]
        status: Option<TransactionStatus>,
    },
    /// Verified, unverified and earned totals
    Summary,
    /// Show a single transaction
    Show {
        #[arg(value_name = "TX_ID")]
        id: String,
    },
    /// Validate a transaction against the receipt number on the customer's slip
    Validate {
        #[arg(value_name = "TX_ID")]
        id: String,
        #[arg(value_name = "RECEIPT")]
        receipt_number: String,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Show the totals of the next invoice without creating it
    Draft,
    /// Invoice every validated, completed transaction
    Create,
    /// List invoices
    List,
    /// Approve a pending invoice, deleting its transactions
    Approve {
        #[arg(value_name = "INVOICE_ID")]
        id: String,
        /// Approving user id
        #[arg(long)]
        caller: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
}

impl Commands {
    /// Whether the command talks to the payment gateway.
    pub fn uses_gateway(&self) -> bool {
        matches!(
            self,
            Commands::Checkout { .. }
                | Commands::Confirm { .. }
                | Commands::Tx(TxCommands::Validate { .. })
        )
    }
}

fn parse_item(raw: &str) -> Result<LineItem, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected NAME:QUANTITY:PRICE, got {raw:?}"));
    };
    let quantity: u32 = quantity
        .parse()
        .map_err(|_| format!("quantity {quantity:?} is not a whole number"))?;
    let price = parse_money(price)?;

    LineItem::new(name, "", "", quantity, price).map_err(|e| e.to_string())
}

fn parse_money(raw: &str) -> Result<Decimal, String> {
    money::parse_amount(raw).map_err(|e| e.to_string())
}

fn parse_status(raw: &str) -> Result<TransactionStatus, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(TransactionStatus::Pending),
        "completed" => Ok(TransactionStatus::Completed),
        "invoiced" => Ok(TransactionStatus::Invoiced),
        other => Err(format!("unknown transaction status {other:?}")),
    }
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse().map_err(|e: order_ledger::error::LedgerError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn item_parses_name_with_colons() {
        let item = parse_item("Tea: green:2:150.50").unwrap();

        assert_eq!(item.name, "Tea: green");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.unit_price, dec!(150.50));
    }

    #[test]
    fn item_rejects_bad_quantity() {
        assert!(parse_item("Tea:two:1").is_err());
        assert!(parse_item("Tea:0:1").is_err());
        assert!(parse_item("Tea").is_err());
    }

    #[test]
    fn cli_parses_approve() {
        let cli = Cli::try_parse_from([
            "order-ledger",
            "invoice",
            "approve",
            "inv1abc",
            "--caller",
            "owner",
            "--role",
            "super-admin",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Invoice(InvoiceCommands::Approve { role: Role::SuperAdmin, .. })
        ));
    }

    #[test]
    fn list_takes_status_filter() {
        let cli = Cli::try_parse_from(["order-ledger", "tx", "list", "--status", "Completed"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Tx(TxCommands::List { status: Some(TransactionStatus::Completed), .. })
        ));
        assert!(!cli.command.uses_gateway());
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn only_payment_commands_need_gateway() {
        let validate = Cli::try_parse_from(["order-ledger", "tx", "validate", "txn1a", "RCPT"]).unwrap();
        let summary = Cli::try_parse_from(["order-ledger", "tx", "summary"]).unwrap();

        assert!(validate.command.uses_gateway());
        assert!(!summary.command.uses_gateway());
    }
}
