// HTLC model - owners, directions, identifiers and the add payload

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Whose commitment chain a fact is recorded against
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Owner {
    Local,
    Remote,
}

impl Owner {
    /// The other side of the channel
    pub fn inverted(self) -> Self {
        match self {
            Owner::Local => Owner::Remote,
            Owner::Remote => Owner::Local,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Owner::Local => 0,
            Owner::Remote => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Owner::Local),
            1 => Some(Owner::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Local => write!(f, "local"),
            Owner::Remote => write!(f, "remote"),
        }
    }
}

/// Direction of an HTLC relative to the owner whose chain is viewed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Proposed by the viewed owner
    Sent,
    /// Proposed by the other owner
    Received,
}

impl Direction {
    /// The proposer of HTLCs that appear with this direction in `subject`'s chain
    pub fn proposer_for(self, subject: Owner) -> Owner {
        match self {
            Direction::Sent => subject,
            Direction::Received => subject.inverted(),
        }
    }

    /// Direction of an HTLC proposed by `proposer` as seen in `subject`'s chain
    pub fn relative_to(subject: Owner, proposer: Owner) -> Self {
        if subject == proposer {
            Direction::Sent
        } else {
            Direction::Received
        }
    }
}

/// Identifier of an HTLC: the proposing owner and its sequence number
///
/// Sequence numbers are allocated by the proposer, start at zero and are
/// never reused, so the local and remote streams never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HtlcId {
    pub proposer: Owner,
    pub seq: u64,
}

impl HtlcId {
    pub fn new(proposer: Owner, seq: u64) -> Self {
        Self { proposer, seq }
    }

    /// An HTLC we offered
    pub fn local(seq: u64) -> Self {
        Self::new(Owner::Local, seq)
    }

    /// An HTLC the counterparty offered
    pub fn remote(seq: u64) -> Self {
        Self::new(Owner::Remote, seq)
    }
}

impl fmt::Display for HtlcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.proposer, self.seq)
    }
}

/// SHA-256 payment hash locking an HTLC
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentHash([u8; 32]);

impl PaymentHash {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a payment preimage
    pub fn from_preimage(preimage: &[u8; 32]) -> Self {
        let digest = Sha256::digest(preimage);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Terms of an HTLC as offered by its proposer
///
/// The onion packet is carried opaquely; the ledger stores it but never
/// looks inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcTerms {
    amount_msat: u64,
    payment_hash: PaymentHash,
    cltv_expiry: u32,
    onion: Vec<u8>,
}

impl HtlcTerms {
    pub fn new(
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion: Vec<u8>,
    ) -> Self {
        Self {
            amount_msat,
            payment_hash,
            cltv_expiry,
            onion,
        }
    }

    /// Get the amount in millisatoshi
    pub fn amount_msat(&self) -> u64 {
        self.amount_msat
    }

    /// Get the payment hash
    pub fn payment_hash(&self) -> &PaymentHash {
        &self.payment_hash
    }

    /// Get the absolute timeout height
    pub fn cltv_expiry(&self) -> u32 {
        self.cltv_expiry
    }

    /// Get the opaque onion payload
    pub fn onion(&self) -> &[u8] {
        &self.onion
    }
}

/// An HTLC add together with the sequence number its proposer assigned
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Htlc {
    id: u64,
    terms: HtlcTerms,
}

impl Htlc {
    pub fn new(id: u64, terms: HtlcTerms) -> Self {
        Self { id, terms }
    }

    /// Get the proposer-assigned sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the HTLC terms
    pub fn terms(&self) -> &HtlcTerms {
        &self.terms
    }

    pub fn amount_msat(&self) -> u64 {
        self.terms.amount_msat
    }

    pub fn payment_hash(&self) -> &PaymentHash {
        &self.terms.payment_hash
    }

    /// Check whether a preimage unlocks this HTLC
    pub fn matches_preimage(&self, preimage: &[u8; 32]) -> bool {
        PaymentHash::from_preimage(preimage) == self.terms.payment_hash
    }
}

/// How an HTLC was removed from the channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Paid: the preimage was released
    Settled,
    /// Cancelled
    Failed,
}
