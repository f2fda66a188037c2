//! All-hadronic export for hypergraph reconstruction training: jet and
//! global inputs under `INPUTS`, assignment targets under `LABELS`.

use ndarray::Array2;

use kinematics::Ragged;

use crate::BoxErr;
use crate::io::hdf5::{write_matrix, write_table, MatchInfo, ParsedFile, StagedFile};
use crate::matching::UNMATCHED;
use crate::selection::check_aligned;

/// Width of the assignment-target table. Fixed by the consumer's graph
/// size, not by the input file.
pub const LABEL_WIDTH: usize = 22;

/// Value marking an unmatched truth slot in the exported labels (the live
/// sentinel is remapped so padding can take its place).
pub const LABEL_UNMATCHED: i64 = -8;

/// Padding value for label slots beyond the event's truth content.
pub const LABEL_PAD: i64 = -9;

pub use rows::*;
#[allow(nonstandard_style)]
mod rows {
    //! Field names follow the consumer's dataset schema.

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct HyperJet {
        pub e: f32,
        pub eta: f32,
        pub phi: f32,
        pub pt: f32,
        pub btag: i32,
        pub charge: f32,
    }

    #[derive(hdf5::H5Type, Clone, Copy, PartialEq, Debug)]
    #[repr(C)]
    pub struct HyperGlobal {
        pub njet: f32,
        pub nbTagged: f32,
    }
}

const JET_FILL: HyperJet = HyperJet { e: 0.0, eta: 0.0, phi: 0.0, pt: 0.0, btag: 0, charge: 0.0 };

pub struct Tables {
    pub jet: Array2<HyperJet>,
    pub global: Array2<HyperGlobal>,
    pub vertex_id: Array2<i64>,
    pub index_select: Vec<i32>,
}

/// Assemble the export tables from a parsed all-hadronic file and its
/// matching results.
pub fn build_tables(parsed: &ParsedFile, matches: &MatchInfo) -> BoxErr<Tables> {
    let vectors = parsed.jets.vectors();
    let width = parsed.jets.pt.counts().into_iter().max().unwrap_or(0);
    let entries = Ragged::from_flat(
        vectors.flat().iter().zip(parsed.jets.btag.flat())
            .map(|(v, &b)| HyperJet {
                e: v.e as f32,
                eta: v.eta() as f32,
                phi: v.phi() as f32,
                pt: v.pt() as f32,
                btag: (b != 0) as i32,
                charge: 0.0,
            })
            .collect(),
        vectors.offsets().to_vec(),
    );
    let jet = entries.pad(width, JET_FILL);

    let global = Array2::from_shape_fn((parsed.jets.pt.len(), 1), |(event, _)| HyperGlobal {
        njet: parsed.jets.pt.count(event) as f32,
        nbTagged: parsed.jets.btag.row(event).iter().filter(|&&b| b != 0).count() as f32,
    });

    // live sentinel first, then padding, so the two stay distinguishable
    let vertex_id = matches.jet
        .map(|v| if v == UNMATCHED { LABEL_UNMATCHED } else { v })
        .pad(LABEL_WIDTH, LABEL_PAD);

    check_aligned(&[
        ("jet", jet.nrows()),
        ("global", global.nrows()),
        ("VertexID", vertex_id.nrows()),
        ("IndexSelect", matches.fully_matched.len()),
    ])?;

    Ok(Tables {
        jet,
        global,
        vertex_id,
        index_select: matches.fully_matched.clone(),
    })
}

pub fn write(path: &std::path::Path, tables: &Tables) -> BoxErr<()> {
    let staged = StagedFile::create(path)?;
    let inputs = staged.file().create_group("INPUTS")?;
    write_matrix(&inputs, "jet", &tables.jet)?;
    write_matrix(&inputs, "global", &tables.global)?;
    let labels = staged.file().create_group("LABELS")?;
    write_matrix(&labels, "VertexID", &tables.vertex_id)?;
    write_table(&labels, "IndexSelect", &tables.index_select)?;
    staged.persist()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{JetRow, JetTable, KinSet, LeptonRow, LeptonTable, MetRow, MetTable, TruthParticleRow};
    use pretty_assertions::assert_eq;

    fn parsed_two_events() -> ParsedFile {
        let jets = vec![
            JetRow { event_id: 0, pt: 90.0, eta: 0.0, phi: 0.0, mass: 9.0, btag: 1 },
            JetRow { event_id: 0, pt: 60.0, eta: 1.0, phi: 1.0, mass: 8.0, btag: 0 },
            JetRow { event_id: 1, pt: 70.0, eta: -1.0, phi: 2.0, mass: 7.0, btag: 1 },
        ];
        let decays = vec![
            TruthParticleRow { event_id: 0, pid: 2, pt: 85.0, eta: 0.0, phi: 0.0, energy: 90.0, mass: 0.0 },
            TruthParticleRow { event_id: 1, pid: 2, pt: 65.0, eta: -1.0, phi: 2.0, energy: 100.0, mass: 0.0 },
        ];
        let met = vec![
            MetRow { event_id: 0, met: 20.0, eta: 0.0, phi: 0.0 },
            MetRow { event_id: 1, met: 25.0, eta: 0.0, phi: 0.0 },
        ];
        ParsedFile {
            event_number: vec![7, 8],
            w_decay: KinSet::from_rows(2, &decays).unwrap(),
            jets: JetTable::from_rows(2, &jets).unwrap(),
            electrons: LeptonTable::from_rows(2, &[] as &[LeptonRow]).unwrap(),
            muons: LeptonTable::from_rows(2, &[] as &[LeptonRow]).unwrap(),
            met: MetTable::from_rows(2, &met).unwrap(),
        }
    }

    fn match_info() -> MatchInfo {
        MatchInfo {
            jet: Ragged::from_rows(vec![vec![0, UNMATCHED], vec![0]]),
            fully_matched: vec![0, 1],
        }
    }

    #[test]
    fn labels_remap_sentinel_and_pad() {
        let tables = build_tables(&parsed_two_events(), &match_info()).unwrap();
        assert_eq!(tables.vertex_id.shape(), &[2, LABEL_WIDTH]);
        assert_eq!(tables.vertex_id[(0, 0)], 0);
        assert_eq!(tables.vertex_id[(0, 1)], LABEL_UNMATCHED);
        assert_eq!(tables.vertex_id[(0, 2)], LABEL_PAD);
        assert_eq!(tables.vertex_id[(1, 1)], LABEL_PAD);
    }

    #[test]
    fn globals_count_jets_and_tags() {
        let tables = build_tables(&parsed_two_events(), &match_info()).unwrap();
        assert_eq!(tables.global.shape(), &[2, 1]);
        assert_eq!(tables.global[(0, 0)].njet, 2.0);
        assert_eq!(tables.global[(0, 0)].nbTagged, 1.0);
    }

    #[test]
    fn jet_inputs_pad_to_widest_event() {
        let tables = build_tables(&parsed_two_events(), &match_info()).unwrap();
        assert_eq!(tables.jet.shape(), &[2, 2]);
        assert_eq!(tables.jet[(1, 1)], JET_FILL);
        assert_eq!(tables.jet[(1, 0)].btag, 1);
    }

    #[test]
    fn full_file_write_roundtrip() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hyper.h5");
        let tables = build_tables(&parsed_two_events(), &match_info()).unwrap();
        write(&path, &tables)?;
        let labels = crate::io::hdf5::read_table::<i32>(
            &path.as_path(), "LABELS/IndexSelect", crate::config::Bounds::none())?;
        assert_eq!(labels.to_vec(), vec![0, 1]);
        Ok(())
    }
}
