//! Truth → reconstruction ΔR matching and assignment-quality flags.
//!
//! Every truth object independently claims the nearest reconstructed object
//! of its compatible class; nothing stops two truth objects claiming the
//! same one. Collisions are detected afterwards, per event, by
//! [`examine_matched_indices`].

use kinematics::{FourVec, Ragged};

use crate::config::MatchConfig;
use crate::pdg::{reco_class, RecoClass, ELECTRON_MASS, MUON_MASS};
use crate::tables::DelphesBatch;
use crate::truth::TruthRecord;

/// Index value meaning "no reconstructed object within threshold".
pub const UNMATCHED: i64 = -9;

/// Per-truth-slot matched indices (one sequence per reconstructed class,
/// all aligned to the fixed truth ordering) and the per-event quality flags
/// derived from them.
pub struct MatchRecord {
    pub pid: Ragged<i32>,
    pub jet: Ragged<i64>,
    pub electron: Ragged<i64>,
    pub muon: Ragged<i64>,
    pub fully_matched: Vec<i32>,
    pub contains_duplicates: Vec<i32>,
}

/// For each truth object, the index of the ΔR-nearest candidate, provided
/// the truth object is routed to this class (`active`) and the minimum is
/// below `dr_max`; otherwise [`UNMATCHED`].
///
/// An event with no candidates yields all-[`UNMATCHED`] rather than failing:
/// argmin over an empty candidate axis is "no match", not an error. Ties go
/// to the lowest candidate index.
pub fn match_to_class(
    truth: &Ragged<FourVec>,
    candidates: &Ragged<FourVec>,
    dr_max: f64,
    active: &Ragged<bool>,
) -> Ragged<i64> {
    assert!(truth.same_shape(active), "class-routing mask must align with the truth slots");
    let dr = truth.pairwise_apply(candidates, |t, c| t.delta_r(&c));
    let best = dr.argmin_along_axis(truth, candidates);
    let mut out = Ragged::new();
    for (row, arow) in best.iter().zip(active.iter()) {
        out.push_row(row.iter().zip(arow).map(|(m, &on)| match m {
            Some((idx, dr)) if on && *dr < dr_max => *idx as i64,
            _ => UNMATCHED,
        }));
    }
    out
}

/// Run the full per-class matching for a batch: b quarks and W-decay quarks
/// against jets, truth electrons/muons against their reconstructed class.
/// Slot ordering is the truth record's matchable ordering (bs first, then W
/// decay products); `max_index` is the channel's expected slot count, the
/// label universe for the quality flags.
pub fn do_matching(truth: &TruthRecord, reco: &DelphesBatch, config: &MatchConfig, max_index: usize) -> MatchRecord {
    let matchable = truth.matchable();
    let vectors = matchable.vectors();

    let routed_to = |class: RecoClass| matchable.pid.map(|pid| reco_class(pid) == Some(class));

    let jet = match_to_class(&vectors, &reco.jets.vectors(), config.jet_dr_max,
                             &routed_to(RecoClass::Jet));
    let electron = match_to_class(&vectors, &reco.electrons.vectors(ELECTRON_MASS),
                                  config.lepton_dr_max, &routed_to(RecoClass::Electron));
    let muon = match_to_class(&vectors, &reco.muons.vectors(MUON_MASS),
                              config.lepton_dr_max, &routed_to(RecoClass::Muon));

    let (fully_matched, contains_duplicates) =
        examine_matched_indices(&[&jet, &electron, &muon], max_index);

    MatchRecord {
        pid: matchable.pid.clone(),
        jet,
        electron,
        muon,
        fully_matched,
        contains_duplicates,
    }
}

/// Classify the combined assignment of an event from its per-class
/// matched-index sequences.
///
/// `contains_duplicates` is set when any reconstructed object is claimed
/// more than once (within its class's index space; sentinels never count).
/// `fully_matched` is set when the non-sentinel assignments number exactly
/// `max_index` and are pairwise distinct — i.e. every expected truth slot
/// received its own reconstructed object. Sentinel entries beyond those
/// assignments are irrelevant to the flag.
pub fn examine_matched_indices(
    classes: &[&Ragged<i64>],
    max_index: usize,
) -> (Vec<i32>, Vec<i32>) {
    let n_events = classes.first().map_or(0, |c| c.len());
    for class in classes {
        assert_eq!(class.len(), n_events, "matched-index sequences disagree in event count");
    }
    let mut fully = Vec::with_capacity(n_events);
    let mut dupl = Vec::with_capacity(n_events);
    let mut claimed: Vec<(usize, i64)> = Vec::new();
    for event in 0..n_events {
        claimed.clear();
        for (class_idx, class) in classes.iter().enumerate() {
            claimed.extend(class.row(event).iter()
                           .filter(|&&v| v != UNMATCHED)
                           .map(|&v| (class_idx, v)));
        }
        claimed.sort_unstable();
        let has_duplicate = claimed.windows(2).any(|w| w[0] == w[1]);
        fully.push((claimed.len() == max_index && !has_duplicate) as i32);
        dupl.push(has_duplicate as i32);
    }
    (fully, dupl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinematics::FourVec;
    use pretty_assertions::assert_eq;

    fn vectors(rows: &[&[(f64, f64)]]) -> Ragged<FourVec> {
        // pt/energy values are irrelevant to ΔR; only (eta, phi) matter
        Ragged::from_rows(rows.iter().map(|row| {
            row.iter().map(|&(eta, phi)| FourVec::from_ptetaphie(50.0, eta, phi, 500.0)).collect()
        }))
    }

    fn all_active(truth: &Ragged<FourVec>) -> Ragged<bool> {
        truth.map(|_| true)
    }

    fn indices(rows: &[&[i64]]) -> Ragged<i64> {
        Ragged::from_rows(rows.iter().map(|r| r.to_vec()))
    }

    #[test]
    fn nearest_within_threshold_is_matched() {
        let truth = vectors(&[&[(0.0, 0.0)]]);
        let cands = vectors(&[&[(0.0, 0.3), (0.0, 0.1), (2.0, 2.0)]]);
        let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
        assert_eq!(m.row(0), &[1]);
    }

    #[test]
    fn minimum_above_threshold_is_unmatched() {
        let truth = vectors(&[&[(0.0, 0.0)]]);
        let cands = vectors(&[&[(0.0, 0.5), (1.0, 1.0)]]);
        let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
        assert_eq!(m.row(0), &[UNMATCHED]);
    }

    #[test]
    fn zero_candidates_short_circuits_to_unmatched() {
        let truth = vectors(&[&[(0.0, 0.0), (1.0, 1.0)], &[(0.5, 0.5)]]);
        let cands = vectors(&[&[], &[(0.5, 0.52)]]);
        let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
        assert_eq!(m.row(0), &[UNMATCHED, UNMATCHED]);
        assert_eq!(m.row(1), &[0]);
    }

    #[test]
    fn equidistant_candidates_resolve_to_lowest_index() {
        let truth = vectors(&[&[(0.0, 0.0)]]);
        // two candidates at identical ΔR = 0.2
        let cands = vectors(&[&[(0.0, 0.2), (0.0, -0.2)]]);
        for _ in 0..3 {
            let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
            assert_eq!(m.row(0), &[0]);
        }
    }

    #[test]
    fn inactive_slots_stay_unmatched_even_when_close() {
        let truth = vectors(&[&[(0.0, 0.0), (0.0, 0.1)]]);
        let cands = vectors(&[&[(0.0, 0.05)]]);
        let active = Ragged::from_rows(vec![vec![false, true]]);
        let m = match_to_class(&truth, &cands, 0.4, &active);
        assert_eq!(m.row(0), &[UNMATCHED, 0]);
    }

    #[test]
    fn two_truth_objects_may_claim_one_candidate() {
        let truth = vectors(&[&[(0.0, 0.0), (0.0, 0.05)]]);
        let cands = vectors(&[&[(0.0, 0.02)]]);
        let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
        assert_eq!(m.row(0), &[0, 0]);
        let (fully, dupl) = examine_matched_indices(&[&m], 2);
        assert_eq!((fully[0], dupl[0]), (0, 1));
    }

    #[test]
    fn duplicate_index_flags_event() {
        // index 2 claimed twice, 0 and 1 once each
        let m = indices(&[&[0, 2, 2, 1]]);
        let (fully, dupl) = examine_matched_indices(&[&m], 4);
        assert_eq!(fully, vec![0]);
        assert_eq!(dupl, vec![1]);
    }

    #[test]
    fn full_match_ignores_extra_sentinels() {
        let a = indices(&[&[0, 1, UNMATCHED]]);
        let b = indices(&[&[UNMATCHED, 2, UNMATCHED]]);
        let (fully, dupl) = examine_matched_indices(&[&a, &b], 3);
        assert_eq!(fully, vec![1]);
        assert_eq!(dupl, vec![0]);
    }

    #[test]
    fn missing_assignment_fails_full_match_without_duplicates() {
        let m = indices(&[&[0, UNMATCHED, 2]]);
        let (fully, dupl) = examine_matched_indices(&[&m], 3);
        assert_eq!(fully, vec![0]);
        assert_eq!(dupl, vec![0]);
    }

    #[test]
    fn same_index_in_different_classes_is_not_a_duplicate() {
        let jets = indices(&[&[0, UNMATCHED]]);
        let electrons = indices(&[&[UNMATCHED, 0]]);
        let (fully, dupl) = examine_matched_indices(&[&jets, &electrons], 2);
        assert_eq!(fully, vec![1]);
        assert_eq!(dupl, vec![0]);
    }

    mod properties {
        use super::*;
        use kinematics::delta_r;
        use proptest::prelude::*;

        proptest! {
            /// A candidate is assigned iff it is the global ΔR minimum for
            /// its truth object AND that minimum is below threshold.
            #[test]
            fn matched_iff_argmin_and_below_threshold(
                cands in proptest::collection::vec((-2.0..2.0f64, -3.0..3.0f64), 0..6),
            ) {
                let truth = vectors(&[&[(0.0, 0.0)]]);
                let cand_rows: Vec<&[(f64, f64)]> = vec![&cands];
                let cand_vecs = vectors(&cand_rows);
                let m = match_to_class(&truth, &cand_vecs, 0.4, &all_active(&truth));

                let brute: Option<usize> = cands.iter().enumerate()
                    .map(|(i, &(eta, phi))| (i, delta_r(0.0, 0.0, eta, phi)))
                    .fold(None, |acc: Option<(usize, f64)>, (i, dr)| match acc {
                        Some((_, best)) if best <= dr => acc,
                        _ => Some((i, dr)),
                    })
                    .filter(|&(_, dr)| dr < 0.4)
                    .map(|(i, _)| i);
                let expected = brute.map_or(UNMATCHED, |i| i as i64);
                prop_assert_eq!(m.row(0), &[expected]);
            }
        }
    }

    /// Two truth W-decay products against three jets, checked end to end
    /// through matching and classification.
    #[test]
    fn end_to_end_two_truth_three_jets() {
        let truth = vectors(&[&[(0.1, 0.2), (-0.3, 1.0)]]);
        // jet 0 at ΔR 0.05 from truth 0; jet 2 at ΔR 0.05 from truth 1;
        // every other pairing well above threshold
        let cands = vectors(&[&[(0.1, 0.25), (0.1, 0.7), (-0.3, 1.05)]]);
        let m = match_to_class(&truth, &cands, 0.4, &all_active(&truth));
        assert_eq!(m.row(0), &[0, 2]);
        let (fully, dupl) = examine_matched_indices(&[&m], 2);
        assert_eq!((fully[0], dupl[0]), (1, 0));
    }
}
