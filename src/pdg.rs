//! Enumerated PDG-id classification.
//!
//! All particle-identity decisions in the pipeline go through the types
//! here; nothing dispatches on name strings at runtime. Unknown ids in an
//! input file are reported as errors at load time, never skipped.

use particle_id::ParticleID;
use particle_id::sm_elementary_particles::{electron, muon, bottom};

/// Standard-model species relevant to top-quark final states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Down, Up, Strange, Charm, Bottom, Top,
    Electron, ElectronNeutrino,
    Muon, MuonNeutrino,
    Tau, TauNeutrino,
    Gluon, Photon, Z, W, Higgs,
}

impl ParticleKind {
    /// Classify a signed PDG id into (species, is-antiparticle).
    pub fn classify(id: ParticleID) -> Option<(ParticleKind, bool)> {
        use ParticleKind::*;
        let anti = id.id() < 0;
        let kind = match id.id().abs() {
            1 => Down,
            2 => Up,
            3 => Strange,
            4 => Charm,
            5 => Bottom,
            6 => Top,
            11 => Electron,
            12 => ElectronNeutrino,
            13 => Muon,
            14 => MuonNeutrino,
            15 => Tau,
            16 => TauNeutrino,
            21 => Gluon,
            22 => Photon,
            23 => Z,
            24 => W,
            25 => Higgs,
            _ => return None,
        };
        Some((kind, anti))
    }

    /// Dataset name for the (species, antiparticle) pair, matching the
    /// particle/antiparticle table naming of the parton-level output.
    pub fn table_name(self, anti: bool) -> &'static str {
        use ParticleKind::*;
        match (self, anti) {
            (Down, false) => "down",                        (Down, true) => "anti_down",
            (Up, false) => "up",                            (Up, true) => "anti_up",
            (Strange, false) => "strange",                  (Strange, true) => "anti_strange",
            (Charm, false) => "charm",                      (Charm, true) => "anti_charm",
            (Bottom, false) => "bottom",                    (Bottom, true) => "anti_bottom",
            (Top, false) => "top",                          (Top, true) => "anti_top",
            (Electron, false) => "electron",                (Electron, true) => "anti_electron",
            (ElectronNeutrino, false) => "electron_neutrino",
            (ElectronNeutrino, true) => "anti_electron_neutrino",
            (Muon, false) => "muon",                        (Muon, true) => "anti_muon",
            (MuonNeutrino, false) => "muon_neutrino",       (MuonNeutrino, true) => "anti_muon_neutrino",
            (Tau, false) => "tau",                          (Tau, true) => "anti_tau",
            (TauNeutrino, false) => "tau_neutrino",         (TauNeutrino, true) => "anti_tau_neutrino",
            (Gluon, _) => "gluon",
            (Photon, _) => "photon",
            (Z, _) => "Z",
            (W, false) => "W_plus",                         (W, true) => "W_minus",
            (Higgs, _) => "higgs",
        }
    }
}

/// Reconstructed-object class a truth object can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoClass {
    Jet,
    Electron,
    Muon,
}

/// Which reconstructed class should hold the detector image of a truth
/// particle. Neutrinos leave none; taus decay before the detector sees a
/// clean lepton, so they are left unmatched too.
pub fn reco_class(pid: i32) -> Option<RecoClass> {
    let a = pid.abs();
    if a >= 1 && a <= bottom.id() {
        Some(RecoClass::Jet)
    } else if a == electron.id() {
        Some(RecoClass::Electron)
    } else if a == muon.id() {
        Some(RecoClass::Muon)
    } else {
        None
    }
}

pub fn is_fermion(pid: i32) -> bool { pid.abs() < 17 && pid != 0 }

pub fn is_lepton(pid: i32) -> bool {
    (electron.id()..=16).contains(&pid.abs())
}

pub fn is_neutrino(pid: i32) -> bool {
    matches!(pid.abs(), 12 | 14 | 16)
}

pub fn is_tau(pid: i32) -> bool { pid.abs() == 15 }

pub const TOP_ID: i32 = 6;
pub const BOTTOM_ID: i32 = 5;
pub const W_ID: i32 = 24;

// Charged-lepton masses in GeV, for rebuilding lepton four-vectors from
// (pt, eta, phi) alone.
pub const ELECTRON_MASS: f64 = 0.5110e-3;
pub const MUON_MASS: f64 = 105.66e-3;

// Status codes in the generator record: hard-process outgoing particles
// carry 22 (resonances) and 23 (outgoing from the matrix element).
pub const STATUS_RESONANCE: i32 = 22;
pub const STATUS_OUTGOING: i32 = 23;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest(/**/ pid , expected,
             case(   1, Some(RecoClass::Jet)),
             case(  -5, Some(RecoClass::Jet)),
             case(  11, Some(RecoClass::Electron)),
             case( -11, Some(RecoClass::Electron)),
             case(  13, Some(RecoClass::Muon)),
             case(  12, None),   // neutrino
             case( -16, None),
             case(  15, None),   // tau
             case(   6, None),   // top itself is not a matchable decay product
    )]
    fn routing(pid: i32, expected: Option<RecoClass>) {
        assert_eq!(reco_class(pid), expected);
    }

    #[test]
    fn classify_covers_signed_ids() {
        let (kind, anti) = ParticleKind::classify(ParticleID::new(-24)).unwrap();
        assert_eq!(kind, ParticleKind::W);
        assert!(anti);
        assert_eq!(kind.table_name(anti), "W_minus");
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(ParticleKind::classify(ParticleID::new(81)).is_none());
    }
}
