//! Event selection for the ML exports: reconstructed and truth lepton
//! multiplicities must both match the requested channel, and τ events are
//! vetoed (their leptons are not the prompt W decays the targets assume).

use kinematics::Ragged;

use crate::BoxErr;
use crate::pdg;

/// Boolean event mask plus its population, kept together so downstream
/// shape checks can report something useful.
pub struct ChannelMask {
    pub keep: Vec<bool>,
    pub n_pass: usize,
}

impl ChannelMask {
    fn new(keep: Vec<bool>) -> Self {
        let n_pass = keep.iter().filter(|&&k| k).count();
        Self { keep, n_pass }
    }
}

/// Events with exactly `n_leptons` reconstructed light leptons whose truth
/// record agrees (2·n_leptons leptonic W decay legs — each leptonic W decay
/// contributes a charged lepton and a neutrino) and no τ anywhere in the
/// truth decays.
pub fn lepton_channel_mask(
    truth_decay_pid: &Ragged<i32>,
    n_electrons: &[usize],
    n_muons: &[usize],
    n_leptons: usize,
) -> BoxErr<ChannelMask> {
    let n_events = truth_decay_pid.len();
    if n_electrons.len() != n_events || n_muons.len() != n_events {
        return Err(format!(
            "reco lepton multiplicities cover {}/{} events but truth covers {n_events}",
            n_electrons.len(), n_muons.len(),
        ).into());
    }
    let keep = (0..n_events).map(|event| {
        let pids = truth_decay_pid.row(event);
        let truth_leptonic = pids.iter().filter(|&&p| pdg::is_lepton(p)).count();
        let has_tau = pids.iter().any(|&p| pdg::is_tau(p));
        let reco_leptons = n_electrons[event] + n_muons[event];
        reco_leptons == n_leptons && truth_leptonic == 2 * n_leptons && !has_tau
    }).collect();
    Ok(ChannelMask::new(keep))
}

/// Check that all derived arrays destined for one output file agree on the
/// event count; aborting here beats writing a torn file.
pub fn check_aligned(counts: &[(&str, usize)]) -> BoxErr<()> {
    if let Some(((_, first), rest)) = counts.split_first() {
        for (name, n) in rest {
            if n != first {
                let summary = counts.iter()
                    .map(|(name, n)| format!("{name}={n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(format!("derived arrays disagree in event count before writing ({summary})").into());
            }
        }
    }
    Ok(())
}
