//! Row types for every HDF5 table the pipeline reads or writes, and the
//! columnar (struct-of-ragged) views the processing stages work on.
//!
//! On disk a jagged branch is a flat dataset of rows tagged with their
//! `event_id`; rows are sorted by event and grouped back into per-event
//! sequences on load. Events with no rows still occupy a slot, so every
//! table stays aligned with the event axis.

use kinematics::{FourVec, Ragged, zip_with_energy, zip_with_mass, zip_with_const_mass};

use crate::BoxErr;

// ----- On-disk rows ----------------------------------------------------------------------------

/// One entry per event; authoritative for the event count and ordering.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct EventRow {
    pub event_id: u32,
    pub number: u32,
}

/// Generator-record particle (truth level).
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct ParticleRow {
    pub event_id: u32,
    pub pid: i32,
    pub status: i32,
    /// Index of the first mother within this event's particle list; -1 if none.
    pub mother: i32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub mass: f64,
}

#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct JetRow {
    pub event_id: u32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub btag: u8,
}

/// Reconstructed electron or muon.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct LeptonRow {
    pub event_id: u32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub charge: i32,
}

/// Missing transverse energy; exactly one per event.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct MetRow {
    pub event_id: u32,
    pub met: f64,
    pub eta: f64,
    pub phi: f64,
}

/// Truth particle written to the parsed file (tops, Ws, bs, W decays).
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct TruthParticleRow {
    pub event_id: u32,
    pub pid: i32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub mass: f64,
}

/// Matched reconstructed-object indices for one truth slot. `slot` runs over
/// the fixed truth ordering (bs first, then W decay products); each class
/// column holds an index into that class's object list, or the unmatched
/// sentinel.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct MatchRow {
    pub event_id: u32,
    pub slot: u32,
    pub pid: i32,
    pub jet: i64,
    pub electron: i64,
    pub muon: i64,
}

/// Per-event assignment quality for the general matching channels.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct MatchSummaryRow {
    pub event_id: u32,
    pub number: u32,
    pub fully_matched: i32,
    pub contains_duplicates: i32,
}

/// Chosen decay-product pairing per truth W (tri-W channel).
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct WPairingRow {
    pub event_id: u32,
    pub truth_w: u32,
    pub pairing: i64,
}

/// Per-event pairing quality for the tri-W channel.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct WSummaryRow {
    pub event_id: u32,
    pub number: u32,
    pub duplicate_matched: i32,
    pub greater_than_0p4: i32,
}

// ----- Grouping rows into per-event sequences --------------------------------------------------

/// Build per-event offsets for `rows`, which must be sorted by event id.
/// Events without rows get empty slots; an id at or beyond `n_events`, or
/// out-of-order rows, mean the file is corrupt and are fatal.
pub fn event_offsets<T>(
    n_events: usize,
    rows: &[T],
    event_of: impl Fn(&T) -> u32,
) -> BoxErr<Vec<usize>> {
    let mut offsets = Vec::with_capacity(n_events + 1);
    offsets.push(0);
    for (i, row) in rows.iter().enumerate() {
        let e = event_of(row) as usize;
        if e >= n_events {
            return Err(format!("row {i} references event {e} but the file declares only {n_events} events").into());
        }
        let filling = offsets.len() - 1;
        if e < filling {
            return Err(format!("table rows are not sorted by event id (row {i} belongs to event {e})").into());
        }
        while offsets.len() - 1 < e {
            offsets.push(i);
        }
    }
    while offsets.len() - 1 < n_events {
        offsets.push(rows.len());
    }
    Ok(offsets)
}

/// Extract one field of each row into a ragged column with the given offsets.
pub fn column<T, V: Copy>(rows: &[T], offsets: &[usize], get: impl Fn(&T) -> V) -> Ragged<V> {
    Ragged::from_flat(rows.iter().map(get).collect(), offsets.to_vec())
}

// ----- Columnar views --------------------------------------------------------------------------

/// Truth-side kinematic columns: one particle species' jagged branches.
#[derive(Clone, Debug, PartialEq)]
pub struct KinSet {
    pub pid: Ragged<i32>,
    pub pt: Ragged<f64>,
    pub eta: Ragged<f64>,
    pub phi: Ragged<f64>,
    pub energy: Ragged<f64>,
    pub mass: Ragged<f64>,
}

impl KinSet {
    pub fn n_events(&self) -> usize { self.pt.len() }

    pub fn counts(&self) -> Vec<usize> { self.pt.counts() }

    pub fn vectors(&self) -> Ragged<FourVec> {
        zip_with_energy(&self.pt, &self.eta, &self.phi, &self.energy)
    }

    /// Keep the particles whose mask entry is true.
    pub fn filter(&self, keep: &Ragged<bool>) -> KinSet {
        KinSet {
            pid: self.pid.filter(keep),
            pt: self.pt.filter(keep),
            eta: self.eta.filter(keep),
            phi: self.phi.filter(keep),
            energy: self.energy.filter(keep),
            mass: self.mass.filter(keep),
        }
    }

    /// Row-wise concatenation with another species.
    pub fn concat(&self, other: &KinSet) -> KinSet {
        KinSet {
            pid: self.pid.concat(&other.pid),
            pt: self.pt.concat(&other.pt),
            eta: self.eta.concat(&other.eta),
            phi: self.phi.concat(&other.phi),
            energy: self.energy.concat(&other.energy),
            mass: self.mass.concat(&other.mass),
        }
    }

    /// Reorder within each event by a row of indices.
    pub fn take(&self, order: &Ragged<usize>) -> KinSet {
        KinSet {
            pid: self.pid.take(order),
            pt: self.pt.take(order),
            eta: self.eta.take(order),
            phi: self.phi.take(order),
            energy: self.energy.take(order),
            mass: self.mass.take(order),
        }
    }

    pub fn to_rows(&self) -> Vec<TruthParticleRow> {
        let mut rows = Vec::with_capacity(self.pid.flat().len());
        for event in 0..self.n_events() {
            for j in 0..self.pid.count(event) {
                rows.push(TruthParticleRow {
                    event_id: event as u32,
                    pid: self.pid.row(event)[j],
                    pt: self.pt.row(event)[j],
                    eta: self.eta.row(event)[j],
                    phi: self.phi.row(event)[j],
                    energy: self.energy.row(event)[j],
                    mass: self.mass.row(event)[j],
                });
            }
        }
        rows
    }

    pub fn from_rows(n_events: usize, rows: &[TruthParticleRow]) -> BoxErr<KinSet> {
        let offsets = event_offsets(n_events, rows, |r| r.event_id)?;
        Ok(KinSet {
            pid: column(rows, &offsets, |r| r.pid),
            pt: column(rows, &offsets, |r| r.pt),
            eta: column(rows, &offsets, |r| r.eta),
            phi: column(rows, &offsets, |r| r.phi),
            energy: column(rows, &offsets, |r| r.energy),
            mass: column(rows, &offsets, |r| r.mass),
        })
    }
}

/// Generator-record columns, before any truth selection.
#[derive(Clone, Debug)]
pub struct ParticleTable {
    pub pid: Ragged<i32>,
    pub status: Ragged<i32>,
    pub mother: Ragged<i32>,
    pub pt: Ragged<f64>,
    pub eta: Ragged<f64>,
    pub phi: Ragged<f64>,
    pub energy: Ragged<f64>,
    pub mass: Ragged<f64>,
}

impl ParticleTable {
    pub fn from_rows(n_events: usize, rows: &[ParticleRow]) -> BoxErr<Self> {
        let offsets = event_offsets(n_events, rows, |r| r.event_id)?;
        Ok(Self {
            pid: column(rows, &offsets, |r| r.pid),
            status: column(rows, &offsets, |r| r.status),
            mother: column(rows, &offsets, |r| r.mother),
            pt: column(rows, &offsets, |r| r.pt),
            eta: column(rows, &offsets, |r| r.eta),
            phi: column(rows, &offsets, |r| r.phi),
            energy: column(rows, &offsets, |r| r.energy),
            mass: column(rows, &offsets, |r| r.mass),
        })
    }

    /// The kinematic columns of the particles passing a mask.
    pub fn kinset(&self, keep: &Ragged<bool>) -> KinSet {
        KinSet {
            pid: self.pid.filter(keep),
            pt: self.pt.filter(keep),
            eta: self.eta.filter(keep),
            phi: self.phi.filter(keep),
            energy: self.energy.filter(keep),
            mass: self.mass.filter(keep),
        }
    }
}

#[derive(Clone, Debug)]
pub struct JetTable {
    pub pt: Ragged<f64>,
    pub eta: Ragged<f64>,
    pub phi: Ragged<f64>,
    pub mass: Ragged<f64>,
    pub btag: Ragged<u8>,
}

impl JetTable {
    pub fn from_rows(n_events: usize, rows: &[JetRow]) -> BoxErr<Self> {
        let offsets = event_offsets(n_events, rows, |r| r.event_id)?;
        Ok(Self {
            pt: column(rows, &offsets, |r| r.pt),
            eta: column(rows, &offsets, |r| r.eta),
            phi: column(rows, &offsets, |r| r.phi),
            mass: column(rows, &offsets, |r| r.mass),
            btag: column(rows, &offsets, |r| r.btag),
        })
    }

    pub fn to_rows(&self) -> Vec<JetRow> {
        let mut rows = Vec::with_capacity(self.pt.flat().len());
        for event in 0..self.pt.len() {
            for j in 0..self.pt.count(event) {
                rows.push(JetRow {
                    event_id: event as u32,
                    pt: self.pt.row(event)[j],
                    eta: self.eta.row(event)[j],
                    phi: self.phi.row(event)[j],
                    mass: self.mass.row(event)[j],
                    btag: self.btag.row(event)[j],
                });
            }
        }
        rows
    }

    pub fn vectors(&self) -> Ragged<FourVec> {
        zip_with_mass(&self.pt, &self.eta, &self.phi, &self.mass)
    }
}

#[derive(Clone, Debug)]
pub struct LeptonTable {
    pub pt: Ragged<f64>,
    pub eta: Ragged<f64>,
    pub phi: Ragged<f64>,
    pub charge: Ragged<i32>,
}

impl LeptonTable {
    pub fn from_rows(n_events: usize, rows: &[LeptonRow]) -> BoxErr<Self> {
        let offsets = event_offsets(n_events, rows, |r| r.event_id)?;
        Ok(Self {
            pt: column(rows, &offsets, |r| r.pt),
            eta: column(rows, &offsets, |r| r.eta),
            phi: column(rows, &offsets, |r| r.phi),
            charge: column(rows, &offsets, |r| r.charge),
        })
    }

    pub fn to_rows(&self) -> Vec<LeptonRow> {
        let mut rows = Vec::with_capacity(self.pt.flat().len());
        for event in 0..self.pt.len() {
            for j in 0..self.pt.count(event) {
                rows.push(LeptonRow {
                    event_id: event as u32,
                    pt: self.pt.row(event)[j],
                    eta: self.eta.row(event)[j],
                    phi: self.phi.row(event)[j],
                    charge: self.charge.row(event)[j],
                });
            }
        }
        rows
    }

    /// Vectors with the species mass attached (leptons are written without
    /// a mass column; the species fixes it).
    pub fn vectors(&self, mass: f64) -> Ragged<FourVec> {
        zip_with_const_mass(&self.pt, &self.eta, &self.phi, mass)
    }

    pub fn multiplicity(&self) -> Vec<usize> { self.pt.counts() }
}

#[derive(Clone, Debug)]
pub struct MetTable {
    pub met: Vec<f64>,
    pub eta: Vec<f64>,
    pub phi: Vec<f64>,
}

impl MetTable {
    /// MET is one row per event; a missing or repeated row means the input
    /// was not produced by the converter and is fatal.
    pub fn from_rows(n_events: usize, rows: &[MetRow]) -> BoxErr<Self> {
        let offsets = event_offsets(n_events, rows, |r| r.event_id)?;
        for (event, w) in offsets.windows(2).enumerate() {
            if w[1] - w[0] != 1 {
                return Err(format!("event {event} has {} MET rows; expected exactly 1", w[1] - w[0]).into());
            }
        }
        Ok(Self {
            met: rows.iter().map(|r| r.met).collect(),
            eta: rows.iter().map(|r| r.eta).collect(),
            phi: rows.iter().map(|r| r.phi).collect(),
        })
    }

    pub fn to_rows(&self) -> Vec<MetRow> {
        (0..self.met.len()).map(|event| MetRow {
            event_id: event as u32,
            met: self.met[event],
            eta: self.eta[event],
            phi: self.phi[event],
        }).collect()
    }
}

/// Everything read from one converter (Delphes-level) input file.
pub struct DelphesBatch {
    pub event_number: Vec<u32>,
    pub particles: ParticleTable,
    pub jets: JetTable,
    pub electrons: LeptonTable,
    pub muons: LeptonTable,
    pub met: MetTable,
}

impl DelphesBatch {
    pub fn n_events(&self) -> usize { self.event_number.len() }
}
