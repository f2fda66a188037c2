//! Truth-level extraction: pick the hard-process particles out of the
//! generator record and validate their multiplicities against the declared
//! physics channel.

use kinematics::Ragged;

use crate::BoxErr;
use crate::pdg::{self, BOTTOM_ID, TOP_ID, W_ID, STATUS_RESONANCE, STATUS_OUTGOING};
use crate::tables::{DelphesBatch, KinSet, ParticleTable};

/// Expected truth multiplicities for a physics channel. A deviation in any
/// event is a hard validation failure: the file does not contain the
/// declared process and must not be silently repaired.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub n_top: usize,
    pub n_w: usize,
    /// Checked only when the channel pins the b multiplicity.
    pub n_b: Option<usize>,
    pub n_w_decay: usize,
}

impl ChannelSpec {
    /// Number of matchable truth slots: bs first, then W decay products.
    pub fn max_index(&self) -> usize {
        self.n_b.unwrap_or(0) + self.n_w_decay
    }
}

pub const FOUR_TOP: ChannelSpec = ChannelSpec {
    name: "four-top",
    n_top: 4,
    n_w: 4,
    n_b: Some(4),
    n_w_decay: 8,
};

pub const TRI_TOP: ChannelSpec = ChannelSpec {
    name: "tri-top",
    n_top: 3,
    n_w: 3,
    n_b: None,
    n_w_decay: 6,
};

/// Truth content of one batch: hard-process tops and Ws, the b quarks, and
/// the W decay products, each as its own jagged species. Built once per
/// file; later stages derive from it and never mutate it.
#[derive(Debug)]
pub struct TruthRecord {
    pub event_number: Vec<u32>,
    pub top: KinSet,
    pub w: KinSet,
    pub b: KinSet,
    pub w_decay: KinSet,
}

impl TruthRecord {
    /// The matchable truth slots in their fixed ordering: b quarks first,
    /// then W decay products.
    pub fn matchable(&self) -> KinSet {
        self.b.concat(&self.w_decay)
    }
}

/// True for particles whose first mother is a W. A mother index outside the
/// event's particle list counts as "no W mother".
fn has_w_mother(particles: &ParticleTable) -> Ragged<bool> {
    let mut out = Ragged::new();
    for event in 0..particles.pid.len() {
        let pids = particles.pid.row(event);
        let mothers = particles.mother.row(event);
        out.push_row(mothers.iter().map(|&m| {
            usize::try_from(m).ok()
                .and_then(|m| pids.get(m))
                .map_or(false, |&mother_pid| mother_pid.abs() == W_ID)
        }));
    }
    out
}

fn zip_and(a: &Ragged<bool>, b: &Ragged<bool>) -> Ragged<bool> {
    assert!(a.same_shape(b), "boolean masks disagree in shape");
    Ragged::from_flat(
        a.flat().iter().zip(b.flat()).map(|(&x, &y)| x && y).collect(),
        a.offsets().to_vec(),
    )
}

fn check_counts(what: &str, expected: usize, counts: &[usize]) -> BoxErr<()> {
    let bad = counts.iter().filter(|&&n| n != expected).count();
    if bad != 0 {
        let first = counts.iter().position(|&n| n != expected).unwrap();
        return Err(format!(
            "{bad} events have other than {expected} {what} (first offender: event {first} with {})",
            counts[first],
        ).into());
    }
    Ok(())
}

/// Extract the truth record from a batch and validate it against `channel`.
pub fn extract_truth(batch: &DelphesBatch, channel: &ChannelSpec) -> BoxErr<TruthRecord> {
    let particles = &batch.particles;

    let resonance = particles.status.map(|s| s == STATUS_RESONANCE);
    let outgoing = particles.status.map(|s| s == STATUS_OUTGOING);
    let is_top = particles.pid.map(|p| p.abs() == TOP_ID);
    let is_w = particles.pid.map(|p| p.abs() == W_ID);
    let is_b = particles.pid.map(|p| p.abs() == BOTTOM_ID);
    let is_fermion = particles.pid.map(pdg::is_fermion);
    let from_w = has_w_mother(particles);
    let not_from_w = from_w.map(|b| !b);

    let top = particles.kinset(&zip_and(&resonance, &is_top));
    let w = particles.kinset(&zip_and(&resonance, &is_w));
    let b = particles.kinset(&zip_and(&zip_and(&outgoing, &not_from_w), &is_b));
    let w_decay = particles.kinset(&zip_and(&from_w, &is_fermion));

    check_counts("hard-process top quarks", channel.n_top, &top.counts())?;
    check_counts("on-shell W bosons", channel.n_w, &w.counts())?;
    if let Some(n_b) = channel.n_b {
        check_counts("b quarks", n_b, &b.counts())?;
    }
    check_counts("W decay products", channel.n_w_decay, &w_decay.counts())?;

    Ok(TruthRecord {
        event_number: batch.event_number.clone(),
        top,
        w,
        b,
        w_decay,
    })
}
