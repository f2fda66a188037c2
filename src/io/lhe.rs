//! Parton-level input: Les Houches Event files.
//!
//! Events are read with the `lhef` crate (transparently gunzipping `.gz`
//! files), final-state particles are bucketed by species through the
//! enumerated PDG mapping, and each bucket becomes one flat kinematic
//! table. Composite buckets (quark types, signed leptons) are derived by
//! per-event concatenation, the way the downstream generators want them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::bufread::GzDecoder;
use kinematics::FourVec;
use particle_id::ParticleID;

use crate::BoxErr;
use crate::pdg::ParticleKind;

/// Status code of a final-state particle in the LHE record.
const FINAL_STATE: i32 = 1;

/// One particle of the parton-level record, as written to the output tables.
#[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
#[repr(C)]
pub struct PartonRow {
    pub event_id: u32,
    pub pid: i32,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub energy: f64,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
}

/// Final-state content of one LHE event.
pub struct LheEvent {
    pub particles: Vec<(i32, FourVec)>,
}

fn open_maybe_gz(path: &Path) -> BoxErr<Box<dyn BufRead>> {
    let file = BufReader::new(File::open(path)
        .map_err(|e| format!("can't open LHE file {}: {e}", path.display()))?);
    Ok(if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(file)
    })
}

/// Read the final-state particles of every event in an LHE file.
pub fn read_lhe(path: &Path) -> BoxErr<Vec<LheEvent>> {
    let mut reader = lhef::Reader::new(open_maybe_gz(path)?)
        .map_err(|e| format!("{}: not a readable LHE file: {e}", path.display()))?;
    let mut events = vec![];
    while let Some(event) = reader.hepeup()
        .map_err(|e| format!("{}: bad event record after {} events: {e}", path.display(), events.len()))?
    {
        let particles = event.IDUP.iter().zip(&event.ISTUP).zip(&event.PUP)
            .filter(|((_, &status), _)| status == FINAL_STATE)
            .map(|((&pid, _), &[px, py, pz, e, _m])| (pid, FourVec::new(px, py, pz, e)))
            .collect();
        events.push(LheEvent { particles });
    }
    Ok(events)
}

/// Species buckets in their output order: every concrete (species,
/// antiparticle) table first, composites after.
const COMPOSITES: [(&str, &[&str]); 6] = [
    ("up_type_quarks",        &["up", "charm", "top"]),
    ("anti_up_type_quarks",   &["anti_up", "anti_charm", "anti_top"]),
    ("down_type_quarks",      &["down", "strange", "bottom"]),
    ("anti_down_type_quarks", &["anti_down", "anti_strange", "anti_bottom"]),
    ("positive_leptons",      &["anti_electron", "anti_muon"]),
    ("negative_leptons",      &["electron", "muon"]),
];

/// Bucket every final-state particle by species table. Only species present
/// in the file get a table; a pid outside the enumerated mapping is a fatal
/// input error, reported with the offending id.
pub fn bucket_by_species(events: &[LheEvent]) -> BoxErr<Vec<(String, Vec<PartonRow>)>> {
    let mut buckets: Vec<(String, Vec<PartonRow>)> = vec![];
    let mut index_of = std::collections::HashMap::<&'static str, usize>::new();

    for (event_id, event) in events.iter().enumerate() {
        for &(pid, v) in &event.particles {
            let (kind, anti) = ParticleKind::classify(ParticleID::new(pid))
                .ok_or_else(|| format!("event {event_id} carries unknown PDG id {pid}"))?;
            let name = kind.table_name(anti);
            let slot = *index_of.entry(name).or_insert_with(|| {
                buckets.push((name.to_owned(), vec![]));
                buckets.len() - 1
            });
            buckets[slot].1.push(PartonRow {
                event_id: event_id as u32,
                pid,
                px: v.px,
                py: v.py,
                pz: v.pz,
                energy: v.e,
                pt: v.pt(),
                eta: v.eta(),
                phi: v.phi(),
            });
        }
    }

    for (composite, members) in COMPOSITES {
        let mut rows: Vec<PartonRow> = members.iter()
            .filter_map(|m| index_of.get(m))
            .flat_map(|&slot| buckets[slot].1.iter().copied())
            .collect();
        if rows.is_empty() { continue }
        // merged per-event ordering: members interleave by event, keeping
        // each member's internal order (stable sort)
        rows.sort_by_key(|r| r.event_id);
        buckets.push((composite.to_owned(), rows));
    }

    Ok(buckets)
}
