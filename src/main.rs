mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, InvoiceCommands, TxCommands};
use order_ledger::{
    cart::{Cart, LineItem},
    checkout::{Checkout, TransactionService},
    config::Config,
    display::{Pager, mask_receipt},
    gateway::PaystackClient,
    invoice::InvoiceService,
    record::Transaction,
    session::Caller,
    store::Store,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(
        Store::open(&config.db_path)
            .with_context(|| format!("failed to open ledger at {}", config.db_path.display()))?,
    );
    // store-only commands run without gateway credentials
    let secret_key = if cli.command.uses_gateway() {
        config.secret_key()?.to_string()
    } else {
        String::new()
    };
    let gateway = Arc::new(PaystackClient::new(
        config.paystack_base_url.clone(),
        secret_key,
        config.customer_email.clone(),
        config.gateway_timeout,
    )?);
    let transactions = TransactionService::new(store.clone(), gateway);
    let invoices = InvoiceService::new(store.clone(), config.withdrawal_percent)?;

    match cli.command {
        Commands::Checkout {
            items,
            delivery_fee,
        } => {
            let mut checkout = new_checkout(&config, items, delivery_fee)?;
            let total = checkout.total()?;
            let link = checkout.begin_payment(&transactions)?;
            println!("Total:     KES {total:.2}");
            println!("Pay at:    {}", link.payment_url);
            println!("Reference: {}", link.reference);
        }
        Commands::Confirm {
            reference,
            items,
            delivery_fee,
        } => {
            let checkout = new_checkout(&config, items, delivery_fee)?;
            let receipt = transactions
                .verify_payment(&reference)
                .context("Payment verification failed. Please try again.")?;
            let tx = transactions.record_transaction(
                checkout.cart(),
                &reference,
                &receipt,
                config.service_fee,
                delivery_fee.unwrap_or(config.delivery_fee),
            )?;
            println!("Recorded {} for KES {:.2}", tx.id, tx.amount);
        }
        Commands::Tx(TxCommands::List {
            page,
            page_size,
            status,
        }) => {
            let all = transactions.list_transactions(status)?;
            let mut pager = Pager::new(all.len(), page_size);
            while pager.current_page() < page && pager.next() {}
            for tx in pager.page_of(&all) {
                print_transaction(tx);
            }
            println!("Page {} of {}", pager.current_page(), pager.total_pages());
        }
        Commands::Tx(TxCommands::Summary) => {
            let summary = transactions.summary()?;
            println!(
                "Pending: {}  Completed: {}  Invoiced: {}",
                summary.pending, summary.completed, summary.invoiced
            );
            println!("Total verified:    KES {:.2}", summary.total_verified);
            println!("Total unverified:  KES {:.2}", summary.total_unverified);
            println!("Ready to invoice:  KES {:.2}", summary.total_invoiceable);
            println!("Total earned:      KES {:.2}", summary.total_earned);
        }
        Commands::Tx(TxCommands::Show { id }) => {
            print_transaction(&transactions.get_transaction(&id)?);
        }
        Commands::Tx(TxCommands::Validate { id, receipt_number }) => {
            match transactions.validate_receipt(&id, &receipt_number) {
                Ok(tx) => println!("Transaction {} has been validated", tx.id),
                Err(e) if e.is_recoverable() => println!("{e}. Please check the receipt and retry."),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Invoice(InvoiceCommands::Draft) => {
            let draft = invoices.draft_invoice()?;
            println!("Transactions:     {}", draft.transaction_ids.len());
            println!("Total amount:     KES {:.2}", draft.total_amount);
            println!("Transaction cost: - KES {:.2}", draft.transaction_cost);
            println!("Net amount:       KES {:.2}", draft.net_amount);
        }
        Commands::Invoice(InvoiceCommands::Create) => {
            let draft = invoices.draft_invoice()?;
            if draft.is_empty() {
                println!("No validated transactions found.");
            } else {
                let invoice = invoices.create_invoice(
                    &draft.transaction_ids,
                    &draft.reference_codes,
                    draft.total_amount,
                    draft.net_amount,
                )?;
                println!("Created invoice {} (net KES {:.2})", invoice.id, invoice.net_amount);
            }
        }
        Commands::Invoice(InvoiceCommands::List) => {
            for invoice in invoices.list_invoices()? {
                println!(
                    "{}  {:?}  {}  {} transactions  total {:.2}  net {:.2}",
                    invoice.id,
                    invoice.status,
                    invoice.created_at,
                    invoice.transaction_ids.len(),
                    invoice.total_amount,
                    invoice.net_amount
                );
            }
        }
        Commands::Invoice(InvoiceCommands::Approve { id, caller, role }) => {
            let invoice = invoices.get_invoice(&id)?;
            let approved = invoices.approve_invoice(
                &Caller::new(caller, role),
                &id,
                &invoice.transaction_ids,
            )?;
            println!("Invoice {} approved", approved.id);
        }
    }

    store.flush()?;
    Ok(())
}

fn new_checkout(
    config: &Config,
    items: Vec<LineItem>,
    delivery_fee: Option<Decimal>,
) -> anyhow::Result<Checkout> {
    let cart = Cart::from(items);
    let checkout = Checkout::new(
        cart,
        config.service_fee,
        delivery_fee.unwrap_or(config.delivery_fee),
    )?;
    Ok(checkout)
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{}  {}  {}  {}  {:.2}  {:?}  {}",
        tx.id,
        mask_receipt(&tx.receipt_number, tx.validated),
        tx.transaction_date,
        tx.reference_code,
        tx.amount,
        tx.status,
        if tx.validated { "Validated" } else { "Not Validated" }
    );
}
