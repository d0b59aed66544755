// Symmetry Tests
// Two ledgers driven by random, protocol-respecting message exchanges
// must agree on each other's commitments whenever the wire is quiet.

use htlc_ledger::htlc::{Direction, Htlc, HtlcId, HtlcTermsBuilder, Outcome, Owner};
use htlc_ledger::ledger::HtlcManager;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};

use Owner::{Local, Remote};

const SEEDS: u64 = 24;
const STEPS: usize = 400;
const MAX_HTLCS: u64 = 30;

/// Messages on the wire, in the order they were sent
#[derive(Debug)]
enum Msg {
    AddHtlc(Htlc),
    Resolve(u64, Outcome),
    CommitmentSigned,
    RevokeAndAck,
}

struct Peer {
    ledger: HtlcManager,
    outbox: VecDeque<Msg>,
}

impl Peer {
    fn new() -> Self {
        let mut ledger = HtlcManager::new();
        ledger.open_finished().unwrap();
        Self {
            ledger,
            outbox: VecDeque::new(),
        }
    }

    fn originate(&mut self, rng: &mut StdRng) {
        if self.ledger.next_htlc_id(Local) >= MAX_HTLCS {
            return;
        }
        let terms = HtlcTermsBuilder::new()
            .amount_msat(rng.gen_range(1..1_000_000))
            .preimage(&rng.gen())
            .cltv_expiry(rng.gen_range(500_000..600_000))
            .build()
            .unwrap();
        let htlc = self.ledger.originate(terms).unwrap();
        self.outbox.push_back(Msg::AddHtlc(htlc));
    }

    /// Settle or fail an incoming HTLC that is committed on the remote chain
    fn resolve(&mut self, rng: &mut StdRng) {
        let candidates: Vec<u64> = self
            .ledger
            .htlcs_in_next(Remote)
            .unwrap()
            .into_iter()
            .filter(|(dir, _)| *dir == Direction::Sent)
            .map(|(_, htlc)| htlc.id())
            .collect();
        if candidates.is_empty() {
            return;
        }
        let seq = candidates[rng.gen_range(0..candidates.len())];
        let outcome = if rng.gen_bool(0.7) {
            Outcome::Settled
        } else {
            Outcome::Failed
        };
        self.ledger.resolve(HtlcId::remote(seq), outcome).unwrap();
        self.outbox.push_back(Msg::Resolve(seq, outcome));
    }

    fn sign(&mut self) {
        if self.ledger.is_revack_pending(Remote).unwrap() {
            return;
        }
        self.ledger.send_commitment().unwrap();
        self.outbox.push_back(Msg::CommitmentSigned);
    }
}

/// Deliver the oldest message from `from` to `to`
fn deliver(from: &mut Peer, to: &mut Peer) -> bool {
    let Some(msg) = from.outbox.pop_front() else {
        return false;
    };
    match msg {
        Msg::AddHtlc(htlc) => {
            to.ledger.receive(htlc).unwrap();
        }
        Msg::Resolve(seq, outcome) => to.ledger.resolve(HtlcId::local(seq), outcome).unwrap(),
        Msg::CommitmentSigned => {
            to.ledger.receive_commitment().unwrap();
            to.ledger.send_revocation().unwrap();
            to.outbox.push_back(Msg::RevokeAndAck);
        }
        Msg::RevokeAndAck => to.ledger.receive_revocation().unwrap(),
    }
    true
}

fn flush(a: &mut Peer, b: &mut Peer) {
    while deliver(a, b) || deliver(b, a) {}
}

fn assert_mirrored(a: &Peer, b: &Peer) {
    for (x, y) in [(a, b), (b, a)] {
        assert_eq!(
            x.ledger.ctn_latest(Remote).unwrap(),
            y.ledger.ctn_latest(Local).unwrap()
        );
        assert_eq!(
            x.ledger.ctn_oldest_unrevoked(Remote).unwrap(),
            y.ledger.ctn_oldest_unrevoked(Local).unwrap()
        );
        assert_eq!(
            x.ledger.htlcs_in_oldest_unrevoked(Remote).unwrap(),
            y.ledger.htlcs_in_oldest_unrevoked(Local).unwrap()
        );
        assert_eq!(
            x.ledger.htlcs_in_latest(Remote).unwrap(),
            y.ledger.htlcs_in_latest(Local).unwrap()
        );
    }
}

/// Everything in the latest view is in the next view unless it was resolved
fn assert_next_covers_latest(m: &HtlcManager) {
    for owner in [Local, Remote] {
        let next = m.htlcs_in_next(owner).unwrap();
        for (dir, htlc) in m.htlcs_in_latest(owner).unwrap() {
            if next.contains(&(dir, htlc.clone())) {
                continue;
            }
            let id = HtlcId::new(dir.proposer_for(owner), htlc.id());
            assert!(
                m.was_htlc_preimage_released(id) || m.was_htlc_failed(id),
                "{id} left the next {owner} view without a removal"
            );
        }
    }
}

fn random_walk(seed: u64) -> (Peer, Peer) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut a = Peer::new();
    let mut b = Peer::new();

    for _ in 0..STEPS {
        let (x, y) = if rng.gen_bool(0.5) {
            (&mut a, &mut b)
        } else {
            (&mut b, &mut a)
        };
        match rng.gen_range(0..10) {
            0 | 1 => x.originate(&mut rng),
            2 | 3 => x.resolve(&mut rng),
            4 | 5 => x.sign(),
            _ => {
                deliver(x, y);
            }
        }

        assert_next_covers_latest(&a.ledger);
        assert_next_covers_latest(&b.ledger);
        if a.outbox.is_empty() && b.outbox.is_empty() {
            assert_mirrored(&a, &b);
        }
    }

    // let everything pending get signed and revoked on both chains
    flush(&mut a, &mut b);
    for _ in 0..3 {
        a.sign();
        flush(&mut a, &mut b);
        b.sign();
        flush(&mut a, &mut b);
    }
    (a, b)
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn test_peers_agree_on_each_others_commitments() {
    for seed in 0..SEEDS {
        let (a, b) = random_walk(seed);
        assert_mirrored(&a, &b);
        assert_eq!(
            a.ledger.htlcs_in_oldest_unrevoked(Local).unwrap(),
            a.ledger.htlcs_in_next(Local).unwrap(),
            "seed {seed}: local chain did not settle"
        );
    }
}

#[test]
fn test_removed_htlcs_leave_latest_and_settle_once() {
    for seed in 0..SEEDS {
        let (a, b) = random_walk(seed);

        for peer in [&a, &b] {
            let m = &peer.ledger;
            let latest_local = m.htlcs_in_latest(Local).unwrap();

            for (dir, htlc) in m.all_htlcs_ever() {
                let id = HtlcId::new(dir.proposer_for(Local), htlc.id());
                if !m.is_htlc_irrevocably_removed_yet(None, id).unwrap() {
                    continue;
                }
                assert!(
                    !latest_local.contains(&(dir, htlc.clone())),
                    "seed {seed}: {id} still local"
                );
                assert!(!m.is_htlc_active_at_ctn(Remote, m.ctn_latest(Remote).unwrap(), id));
                assert!(!m.is_htlc_active_at_ctn(Local, m.ctn_latest(Local).unwrap(), id));
            }

            let settled = m.all_settled_ever(Local).unwrap();
            let unique: HashSet<(Direction, u64)> =
                settled.iter().map(|(dir, h)| (*dir, h.id())).collect();
            assert_eq!(unique.len(), settled.len(), "seed {seed}: settled twice");
            for (dir, htlc) in &settled {
                let id = HtlcId::new(dir.proposer_for(Local), htlc.id());
                assert!(m.was_htlc_preimage_released(id));
            }
        }

        // what A paid is what B saw A pay
        let a_ctn = a.ledger.ctn_oldest_unrevoked(Local).unwrap();
        let b_ctn = b.ledger.ctn_oldest_unrevoked(Remote).unwrap();
        assert_eq!(a_ctn, b_ctn);
        let paid_by_a: Vec<Htlc> = a.ledger.settled_by_direction(Local, Direction::Sent, a_ctn);
        let seen_by_b: Vec<Htlc> = b.ledger.settled_by_direction(Remote, Direction::Sent, b_ctn);
        assert_eq!(paid_by_a, seen_by_b, "seed {seed}");
    }
}
