//! Padded fixed-shape export for neutrino-regression training.
//!
//! One channel selection (lepton multiplicity) is applied to a parsed file,
//! and five object tables plus the event-level columns are written — padded
//! to rectangular shape — under a `data` group, split into train and test
//! files by event index.

use std::path::PathBuf;

use ndarray::{Array2, Axis};

use kinematics::Ragged;

use crate::BoxErr;
use crate::io::hdf5::{write_matrix, write_table, ParsedFile, StagedFile};
use crate::pdg::{self, ELECTRON_MASS, MUON_MASS};
use crate::selection::{check_aligned, ChannelMask};

pub use rows::*;
#[allow(nonstandard_style)]
mod rows {
    //! Field names here are the dataset schema the training code reads;
    //! they follow its conventions, not ours.

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct JetEntry {
        pub pt: f32,
        pub eta: f32,
        pub phi: f32,
        pub energy: f32,
        pub is_tagged: bool,
    }

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct LeptonEntry {
        pub pt: f64,
        pub eta: f64,
        pub phi: f64,
        pub energy: f64,
        pub charge: f64,
        pub lepton_type: f64,
    }

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct NeutrinoEntry {
        pub PDGID: f64,
        pub pt: f64,
        pub eta: f64,
        pub phi: f64,
        pub mass: f64,
    }

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct MetEntry {
        pub MET: f64,
        pub phi: f64,
    }
}

const JET_FILL: JetEntry = JetEntry { pt: 0.0, eta: 0.0, phi: 0.0, energy: 0.0, is_tagged: false };
const LEPTON_FILL: LeptonEntry = LeptonEntry { pt: 0.0, eta: 0.0, phi: 0.0, energy: 0.0, charge: 0.0, lepton_type: 0.0 };
const NEUTRINO_FILL: NeutrinoEntry = NeutrinoEntry { PDGID: 0.0, pt: 0.0, eta: 0.0, phi: 0.0, mass: 0.0 };

/// Everything destined for one pair of output files.
pub struct Tables {
    pub jets: Array2<JetEntry>,
    pub leptons: Array2<LeptonEntry>,
    pub neutrinos: Array2<NeutrinoEntry>,
    pub met: Vec<MetEntry>,
    pub njets: Vec<i64>,
    pub nbjets: Vec<i64>,
    pub event_number: Vec<i64>,
}

/// Jet table: kinematics in f32, energy rebuilt from (pt, eta, phi, mass),
/// padded to the widest event of the *whole* file (the pad width is a file
/// property, not a selection property).
fn build_jets(parsed: &ParsedFile, mask: &ChannelMask) -> Array2<JetEntry> {
    let vectors = parsed.jets.vectors();
    let width = parsed.jets.pt.counts().into_iter().max().unwrap_or(0);
    let entries = Ragged::from_flat(
        vectors.flat().iter().zip(parsed.jets.btag.flat())
            .map(|(v, &b)| JetEntry {
                pt: v.pt() as f32,
                eta: v.eta() as f32,
                phi: v.phi() as f32,
                energy: v.e as f32,
                is_tagged: b != 0,
            })
            .collect(),
        vectors.offsets().to_vec(),
    );
    entries.select_rows(&mask.keep).pad(width, JET_FILL)
}

/// Lepton table: electrons and muons merged, pt-ordered within each event,
/// with the species mass fixing the energy and `type` 0 = electron,
/// 1 = muon.
fn build_leptons(parsed: &ParsedFile, mask: &ChannelMask) -> Array2<LeptonEntry> {
    let electrons = parsed.electrons.vectors(ELECTRON_MASS);
    let muons = parsed.muons.vectors(MUON_MASS);
    let vectors = electrons.concat(&muons);

    let charge = parsed.electrons.charge.concat(&parsed.muons.charge);
    let species = parsed.electrons.charge.map(|_| 0.0_f64)
        .concat(&parsed.muons.charge.map(|_| 1.0_f64));

    let entries = Ragged::from_flat(
        vectors.flat().iter().zip(charge.flat()).zip(species.flat())
            .map(|((v, &q), &s)| LeptonEntry {
                pt: v.pt(),
                eta: v.eta(),
                phi: v.phi(),
                energy: v.e,
                charge: q as f64,
                lepton_type: s,
            })
            .collect(),
        vectors.offsets().to_vec(),
    );

    let selected = entries.select_rows(&mask.keep);
    let order = selected.argsort_desc_by(|e| e.pt);
    let sorted = selected.take(&order);
    let width = sorted.counts().into_iter().max().unwrap_or(0);
    sorted.pad(width, LEPTON_FILL)
}

/// Truth neutrinos: the up-type leptonic W decay legs, ordered by
/// descending PDG id so the antiparticle-side neutrinos come first.
fn build_neutrinos(parsed: &ParsedFile, mask: &ChannelMask) -> Array2<NeutrinoEntry> {
    let leptonic_up = parsed.w_decay.pid.map(|p| pdg::is_neutrino(p));
    let neutrinos = parsed.w_decay.filter(&leptonic_up);

    let entries = Ragged::from_flat(
        neutrinos.pid.flat().iter()
            .zip(neutrinos.pt.flat())
            .zip(neutrinos.eta.flat())
            .zip(neutrinos.phi.flat())
            .map(|(((&pid, &pt), &eta), &phi)| NeutrinoEntry {
                PDGID: pid as f64,
                pt,
                eta,
                phi,
                mass: 0.0,
            })
            .collect(),
        neutrinos.pid.offsets().to_vec(),
    );

    let selected = entries.select_rows(&mask.keep);
    let order = selected.argsort_desc_by(|e| e.PDGID);
    let sorted = selected.take(&order);
    let width = sorted.counts().into_iter().max().unwrap_or(0);
    sorted.pad(width, NEUTRINO_FILL)
}

/// Assemble all tables for one lepton-multiplicity channel.
pub fn build_tables(parsed: &ParsedFile, mask: &ChannelMask) -> BoxErr<Tables> {
    let jets = build_jets(parsed, mask);
    let leptons = build_leptons(parsed, mask);
    let neutrinos = build_neutrinos(parsed, mask);

    let met: Vec<MetEntry> = parsed.met.met.iter().zip(&parsed.met.phi).zip(&mask.keep)
        .filter(|(_, &k)| k)
        .map(|((&met, &phi), _)| MetEntry { MET: met, phi })
        .collect();

    let jet_counts = parsed.jets.pt.counts();
    let btag_counts: Vec<usize> = parsed.jets.btag.iter()
        .map(|row| row.iter().filter(|&&b| b != 0).count())
        .collect();
    let mut njets = vec![];
    let mut nbjets = vec![];
    let mut event_number = vec![];
    for event in 0..mask.keep.len() {
        if mask.keep[event] {
            njets.push(jet_counts[event] as i64);
            nbjets.push(btag_counts[event] as i64);
            event_number.push(parsed.event_number[event] as i64);
        }
    }

    check_aligned(&[
        ("jets", jets.nrows()),
        ("leptons", leptons.nrows()),
        ("neutrinos", neutrinos.nrows()),
        ("MET", met.len()),
        ("event-level", njets.len()),
    ])?;

    Ok(Tables {
        jets,
        leptons,
        neutrinos,
        met,
        njets,
        nbjets,
        event_number,
    })
}

fn rows_where(keep: impl Fn(usize) -> bool, n: usize) -> Vec<usize> {
    (0..n).filter(|&i| keep(i)).collect()
}

fn write_one(path: &PathBuf, tables: &Tables, rows: &[usize]) -> BoxErr<()> {
    let staged = StagedFile::create(path)?;
    let group = staged.file().create_group("data")?;
    write_matrix(&group, "jets", &tables.jets.select(Axis(0), rows))?;
    write_matrix(&group, "leptons", &tables.leptons.select(Axis(0), rows))?;
    write_matrix(&group, "neutrinos", &tables.neutrinos.select(Axis(0), rows))?;
    let pick_rows = |v: &[MetEntry]| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
    write_table(&group, "MET", &pick_rows(&tables.met))?;
    let pick = |v: &[i64]| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
    write_table(&group, "njets", &pick(&tables.njets))?;
    write_table(&group, "nbjets", &pick(&tables.nbjets))?;
    write_table(&group, "eventNumber", &pick(&tables.event_number))?;
    staged.persist()
}

/// Write `<base>_train.h5` and `<base>_test.h5`, sending every
/// `split_ratio`-th event to the test file.
pub fn write_split(base: &str, tables: &Tables, split_ratio: usize) -> BoxErr<()> {
    if split_ratio == 0 {
        return Err("split ratio must be at least 1".into());
    }
    let n = tables.njets.len();
    let test = rows_where(|i| i % split_ratio == 0, n);
    let train = rows_where(|i| i % split_ratio != 0, n);
    write_one(&PathBuf::from(format!("{base}_train.h5")), tables, &train)?;
    write_one(&PathBuf::from(format!("{base}_test.h5")), tables, &test)?;
    Ok(())
}
