pub mod cart;
pub mod checkout;
pub mod config;
pub mod display;
pub mod error;
pub mod gateway;
pub mod invoice;
pub mod money;
pub mod record;
pub mod session;
pub mod store;
pub mod utils;
