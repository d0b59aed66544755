use crate::htlc::{HtlcTerms, PaymentHash};
use thiserror::Error;

/// Errors that can occur when building HTLC terms
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HtlcError {
    #[error("Missing amount: HTLC amount is required")]
    MissingAmount,

    #[error("Missing payment hash: payment hash is required")]
    MissingPaymentHash,

    #[error("Missing expiry: cltv expiry is required")]
    MissingExpiry,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Builder for the terms of an outgoing HTLC
#[derive(Default)]
pub struct HtlcTermsBuilder {
    amount_msat: Option<u64>,
    payment_hash: Option<PaymentHash>,
    cltv_expiry: Option<u32>,
    onion: Vec<u8>,
}

impl HtlcTermsBuilder {
    /// Create a new HtlcTermsBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the amount in millisatoshi (required)
    pub fn amount_msat(mut self, amount_msat: u64) -> Self {
        self.amount_msat = Some(amount_msat);
        self
    }

    /// Set the payment hash (required)
    pub fn payment_hash(mut self, payment_hash: PaymentHash) -> Self {
        self.payment_hash = Some(payment_hash);
        self
    }

    /// Lock to the hash of a known preimage
    pub fn preimage(self, preimage: &[u8; 32]) -> Self {
        self.payment_hash(PaymentHash::from_preimage(preimage))
    }

    /// Set the absolute expiry height (required)
    pub fn cltv_expiry(mut self, cltv_expiry: u32) -> Self {
        self.cltv_expiry = Some(cltv_expiry);
        self
    }

    /// Set the onion packet (optional - empty if not provided)
    pub fn onion(mut self, onion: Vec<u8>) -> Self {
        self.onion = onion;
        self
    }

    /// Validate and build the terms
    pub fn build(self) -> Result<HtlcTerms, HtlcError> {
        let amount_msat = self.amount_msat.ok_or(HtlcError::MissingAmount)?;
        let payment_hash = self.payment_hash.ok_or(HtlcError::MissingPaymentHash)?;
        let cltv_expiry = self.cltv_expiry.ok_or(HtlcError::MissingExpiry)?;

        if amount_msat == 0 {
            return Err(HtlcError::InvalidAmount("amount cannot be zero".to_string()));
        }

        Ok(HtlcTerms::new(amount_msat, payment_hash, cltv_expiry, self.onion))
    }
}
