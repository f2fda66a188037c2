//! W-boson combinatorial reconstruction for the tri-W truth channel.
//!
//! Six W-decay products per event are paired by the fixed partition
//! (0+1, 2+3, 4+5) into three W candidates; each truth W picks the
//! candidate pairing nearest in ΔR. The decay products are then reordered
//! so that each truth W's pair sits at its slot, and the assignment quality
//! is summarised per event.

use itertools::Itertools;
use kinematics::{FourVec, Ragged};
use ordered_float::OrderedFloat;

use crate::BoxErr;
use crate::tables::KinSet;
use crate::truth::TruthRecord;

pub const N_TRUTH_W: usize = 3;
pub const N_DECAY: usize = 2 * N_TRUTH_W;

/// Outcome of the pairing assignment. `decay` holds the decay products
/// reordered into truth-W slot pairs; `pairing` the chosen candidate
/// pairing per truth W.
pub struct WComboRecord {
    pub decay: KinSet,
    pub pairing: Ragged<i64>,
    /// 1 when two truth Ws picked the same candidate pairing.
    pub duplicate_matched: Vec<i32>,
    /// How many of the three minimal ΔR values exceed the quality cut.
    pub greater_than_0p4: Vec<i32>,
}

fn candidate_pairings(decay: &[FourVec]) -> Vec<FourVec> {
    decay.iter().tuples().map(|(&a, &b)| a + b).collect()
}

/// Assign each truth W to its nearest candidate pairing and reorder the
/// decay products accordingly.
///
/// Expects the truth record to carry exactly three Ws and six decay
/// products per event (guaranteed by channel validation upstream; checked
/// again here because this function is meaningless otherwise).
pub fn reconstruct_w_pairings(truth: &TruthRecord, dr_quality_cut: f64) -> BoxErr<WComboRecord> {
    let w_vectors = truth.w.vectors();
    let decay_vectors = truth.w_decay.vectors();

    for (event, (nw, nd)) in w_vectors.counts().iter().zip(decay_vectors.counts()).enumerate() {
        if *nw != N_TRUTH_W || nd != N_DECAY {
            return Err(format!(
                "event {event} has {nw} truth Ws and {nd} decay products; the pairing scheme needs exactly {N_TRUTH_W} and {N_DECAY}"
            ).into());
        }
    }

    let n_events = w_vectors.len();
    let mut pairing = Ragged::new();
    let mut order = Ragged::new();
    let mut duplicate_matched = Vec::with_capacity(n_events);
    let mut greater_than_0p4 = Vec::with_capacity(n_events);

    for event in 0..n_events {
        let truth_ws = w_vectors.row(event);
        let candidates = candidate_pairings(decay_vectors.row(event));

        // 3×3 ΔR matrix, argmin over the candidate axis; ties to the
        // lowest pairing index, as in the general matcher
        let mut chosen = [0usize; N_TRUTH_W];
        let mut minima = [0.0f64; N_TRUTH_W];
        for (slot, w) in truth_ws.iter().enumerate() {
            let (best, dr) = candidates.iter().enumerate()
                .map(|(p, c)| (p, w.delta_r(c)))
                .min_by_key(|&(_, dr)| OrderedFloat(dr))
                .expect("the pairing scheme always yields three candidates");
            chosen[slot] = best;
            minima[slot] = dr;
        }

        let distinct = chosen[0] != chosen[1] && chosen[0] != chosen[2] && chosen[1] != chosen[2];
        duplicate_matched.push(!distinct as i32);
        greater_than_0p4.push(minima.iter().filter(|&&dr| dr > dr_quality_cut).count() as i32);

        pairing.push_row(chosen.iter().map(|&p| p as i64));
        // slot pair k receives the two products of the pairing chosen by
        // truth W k: [2p, 2p+1] for each k in turn
        order.push_row(chosen.iter().flat_map(|&p| [2 * p, 2 * p + 1]));
    }

    Ok(WComboRecord {
        decay: truth.w_decay.take(&order),
        pairing,
        duplicate_matched,
        greater_than_0p4,
    })
}
