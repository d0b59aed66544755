// HTLC Model Tests
// Owners, directions, identifiers and terms

use htlc_ledger::htlc::{
    Direction, Htlc, HtlcError, HtlcId, HtlcTerms, HtlcTermsBuilder, Outcome, Owner, PaymentHash,
};

// ============================================================================
// OWNERS AND DIRECTIONS
// ============================================================================

#[test]
fn test_owner_inverted() {
    assert_eq!(Owner::Local.inverted(), Owner::Remote);
    assert_eq!(Owner::Remote.inverted(), Owner::Local);
    assert_eq!(Owner::Local.inverted().inverted(), Owner::Local);
    assert_eq!(Owner::Local.to_string(), "local");
}

#[test]
fn test_direction_is_relative_to_viewed_chain() {
    // an HTLC we offered is sent in both chains from our point of view,
    // but received when viewed as the counterparty
    for subject in [Owner::Local, Owner::Remote] {
        for proposer in [Owner::Local, Owner::Remote] {
            let direction = Direction::relative_to(subject, proposer);
            assert_eq!(direction.proposer_for(subject), proposer);
        }
    }
    assert_eq!(Direction::relative_to(Owner::Local, Owner::Local), Direction::Sent);
    assert_eq!(Direction::relative_to(Owner::Remote, Owner::Local), Direction::Received);
}

#[test]
fn test_htlc_id_streams_do_not_collide() {
    assert_ne!(HtlcId::local(0), HtlcId::remote(0));
    assert_eq!(HtlcId::new(Owner::Remote, 4), HtlcId::remote(4));
    assert_eq!(HtlcId::local(12).to_string(), "local:12");
}

// ============================================================================
// PAYMENT HASH
// ============================================================================

#[test]
fn test_payment_hash_is_sha256() {
    let hash = PaymentHash::from_preimage(&[0u8; 32]);
    assert_eq!(
        hash.to_string(),
        "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
    );
    assert_eq!(PaymentHash::from_bytes(*hash.as_bytes()), hash);
}

// ============================================================================
// TERMS BUILDER
// ============================================================================

#[test]
fn test_builder_complete() {
    let preimage = [42u8; 32];
    let terms = HtlcTermsBuilder::new()
        .amount_msat(150_000)
        .preimage(&preimage)
        .cltv_expiry(800_144)
        .build()
        .unwrap();

    assert_eq!(terms.amount_msat(), 150_000);
    assert_eq!(terms.cltv_expiry(), 800_144);
    assert!(terms.onion().is_empty());

    let htlc = Htlc::new(3, terms);
    assert_eq!(htlc.id(), 3);
    assert!(htlc.matches_preimage(&preimage));
    assert_eq!(htlc.payment_hash(), &PaymentHash::from_preimage(&preimage));
}

#[test]
fn test_builder_missing_fields() {
    let no_hash = HtlcTermsBuilder::new().amount_msat(1).cltv_expiry(10).build();
    assert_eq!(no_hash, Err(HtlcError::MissingPaymentHash));

    let no_expiry = HtlcTermsBuilder::new()
        .amount_msat(1)
        .payment_hash(PaymentHash::from_bytes([1; 32]))
        .build();
    assert_eq!(no_expiry, Err(HtlcError::MissingExpiry));
}

#[test]
fn test_builder_error_messages() {
    let err = HtlcTermsBuilder::new()
        .amount_msat(0)
        .preimage(&[0; 32])
        .cltv_expiry(1)
        .build()
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid amount: amount cannot be zero");
}

// ============================================================================
// SERIALIZATION
// ============================================================================

#[test]
fn test_htlc_postcard_roundtrip() {
    let htlc = Htlc::new(
        7,
        HtlcTerms::new(9_999, PaymentHash::from_bytes([3; 32]), 123, vec![1, 2, 3]),
    );
    let bytes = postcard::to_allocvec(&htlc).unwrap();
    let decoded: Htlc = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, htlc);

    let bytes = postcard::to_allocvec(&Outcome::Failed).unwrap();
    let outcome: Outcome = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(outcome, Outcome::Failed);
}
