//! Payment gateway collaborator
//!
//! The lifecycle only relies on [`PaymentGateway`]. [`PaystackClient`] talks to
//! a Paystack-compatible HTTP API with blocking calls and a bounded timeout.
use super::cart::LineItem;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Invalid gateway url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMetadata {
    pub products: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub success: bool,
    pub receipt_number: Option<String>,
    pub status: String, // raw gateway status, e.g. "success", "abandoned"
}

pub trait PaymentGateway: Send + Sync {
    /// Creates a payable link for `amount_minor_units` (cents, kobo).
    fn initialize(
        &self,
        amount_minor_units: u64,
        metadata: &PaymentMetadata,
    ) -> Result<InitializedPayment, GatewayError>;

    fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;
}

pub struct PaystackClient {
    client: Client,
    base_url: Url,
    secret_key: String,
    customer_email: String,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    amount: u64,
    email: &'a str,
    metadata: &'a PaymentMetadata,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: Option<String>,
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    receipt_number: Option<String>,
}

impl PaystackClient {
    pub fn new(
        base_url: String,
        secret_key: String,
        customer_email: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url =
            Url::parse(&base_url).map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            secret_key,
            customer_email,
        })
    }

    /// Base url with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl PaymentGateway for PaystackClient {
    fn initialize(
        &self,
        amount_minor_units: u64,
        metadata: &PaymentMetadata,
    ) -> Result<InitializedPayment, GatewayError> {
        let url = self.endpoint(&["transaction", "initialize"])?;
        let body = InitializeRequest {
            amount: amount_minor_units,
            email: &self.customer_email,
            metadata,
        };

        let envelope: Envelope<InitializeData> = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()?
            .json()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!(status = envelope.status, message = %envelope.message, "initialize response");

        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }

        match envelope.data {
            Some(InitializeData {
                authorization_url: Some(authorization_url),
                reference: Some(reference),
            }) if !reference.is_empty() => Ok(InitializedPayment {
                authorization_url,
                reference,
            }),
            _ => Err(GatewayError::InvalidResponse(
                "response carried no payment reference".into(),
            )),
        }
    }

    fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let url = self.endpoint(&["transaction", "verify", reference])?;

        let envelope: Envelope<VerifyData> = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()?
            .json()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !envelope.status {
            warn!(reference, message = %envelope.message, "verification rejected");
            return Err(GatewayError::Rejected(envelope.message));
        }

        let data = envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("verification carried no data".into()))?;

        Ok(Verification {
            success: data.status == "success",
            receipt_number: data.receipt_number,
            status: data.status,
        })
    }
}
