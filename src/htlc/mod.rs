// HTLC module - The conditional payment and its identity

mod builder;
mod model;

pub use builder::{HtlcError, HtlcTermsBuilder};
pub use model::{Direction, Htlc, HtlcId, HtlcTerms, Outcome, Owner, PaymentHash};
