//! Read and write the pipeline's HDF5 tables.
//!
//! Jagged event content is stored as flat row tables sorted by `event_id`
//! (see [`crate::tables`]); this module moves those tables between disk and
//! the columnar in-memory views. Output files are staged to a `.part` path
//! and renamed into place only once complete, so a failed run never leaves
//! a half-written file behind.

use std::path::{Path, PathBuf};

use ndarray::{s, Array1, Array2};

use crate::BoxErr;
use crate::config::Bounds;
use crate::tables::{
    DelphesBatch, EventRow, JetRow, JetTable, KinSet, LeptonRow, LeptonTable,
    MatchRow, MatchSummaryRow, MetRow, MetTable, ParticleRow, ParticleTable,
    TruthParticleRow, WPairingRow, WSummaryRow,
};
use crate::matching::MatchRecord;
use crate::truth::TruthRecord;
use crate::wcombo::WComboRecord;

pub fn read_table<T: hdf5::H5Type>(filename: &dyn AsRef<Path>, dataset: &str, events: Bounds<usize>) -> hdf5::Result<Array1<T>> {
    let file = ::hdf5::File::open(filename)?;
    let dataset = file.dataset(dataset)?;
    let Bounds { min, max } = events;
    let data = match (min, max) {
        (None    , None    ) => dataset.read_slice_1d::<T,_>(s![  ..  ])?,
        (Some(lo), None    ) => dataset.read_slice_1d::<T,_>(s![lo..  ])?,
        (None    , Some(hi)) => dataset.read_slice_1d::<T,_>(s![  ..hi])?,
        (Some(lo), Some(hi)) => dataset.read_slice_1d::<T,_>(s![lo..hi])?,
     };
    Ok(data)
}

pub fn write_table<T: hdf5::H5Type>(group: &hdf5::Group, name: &str, rows: &[T]) -> hdf5::Result<()> {
    group.new_dataset_builder()
        .with_data(rows)
        .create(name)?;
    Ok(())
}

/// Write a padded (events × width) table.
pub fn write_matrix<T: hdf5::H5Type>(group: &hdf5::Group, name: &str, data: &Array2<T>) -> hdf5::Result<()> {
    group.new_dataset_builder()
        .with_data(data)
        .create(name)?;
    Ok(())
}

// ----- Staged output ---------------------------------------------------------------------------

/// An output file written under a temporary name and renamed into place by
/// [`StagedFile::persist`]. Dropping it without persisting removes the
/// partial file.
pub struct StagedFile {
    file: Option<hdf5::File>,
    tmp: PathBuf,
    dest: PathBuf,
}

impl StagedFile {
    pub fn create(dest: &Path) -> BoxErr<Self> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("can't write to {}: {e}", dest.display()))?;
            }
        }
        let mut tmp = dest.as_os_str().to_owned();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        let file = hdf5::File::create(&tmp)?;
        Ok(Self { file: Some(file), tmp, dest: dest.to_owned() })
    }

    pub fn file(&self) -> &hdf5::File {
        self.file.as_ref().expect("staged file already persisted")
    }

    /// Close the file and move it to its final path.
    pub fn persist(mut self) -> BoxErr<()> {
        drop(self.file.take());
        std::fs::rename(&self.tmp, &self.dest)
            .map_err(|e| format!("can't rename {} into place: {e}", self.tmp.display()).into())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

// ----- Converter-level (Delphes) input ---------------------------------------------------------

fn event_numbers(filename: &dyn AsRef<Path>, dataset: &str) -> BoxErr<Vec<u32>> {
    let events = read_table::<EventRow>(filename, dataset, Bounds::none())?.to_vec();
    for (i, row) in events.iter().enumerate() {
        if row.event_id as usize != i {
            return Err(format!(
                "{dataset}: event_id {} at position {i}; event rows must be 0..n in order", row.event_id,
            ).into());
        }
    }
    Ok(events.into_iter().map(|r| r.number).collect())
}

/// Read one converter output file into columnar form.
pub fn read_delphes(path: &Path) -> BoxErr<DelphesBatch> {
    let event_number = event_numbers(&path, "delphes/events")?;
    let n = event_number.len();
    let particles = read_table::<ParticleRow>(&path, "delphes/particles", Bounds::none())?.to_vec();
    let jets = read_table::<JetRow>(&path, "delphes/jets", Bounds::none())?.to_vec();
    let electrons = read_table::<LeptonRow>(&path, "delphes/electrons", Bounds::none())?.to_vec();
    let muons = read_table::<LeptonRow>(&path, "delphes/muons", Bounds::none())?.to_vec();
    let met = read_table::<MetRow>(&path, "delphes/met", Bounds::none())?.to_vec();
    Ok(DelphesBatch {
        particles: ParticleTable::from_rows(n, &particles)?,
        jets: JetTable::from_rows(n, &jets)?,
        electrons: LeptonTable::from_rows(n, &electrons)?,
        muons: LeptonTable::from_rows(n, &muons)?,
        met: MetTable::from_rows(n, &met)?,
        event_number,
    })
}

// ----- Parsed (truth/reco) files ---------------------------------------------------------------

fn event_rows(event_number: &[u32]) -> Vec<EventRow> {
    event_number.iter().enumerate()
        .map(|(i, &number)| EventRow { event_id: i as u32, number })
        .collect()
}

/// Write the truth species tables and the full reco mirror; every channel
/// output starts with this and then adds its own matching datasets.
pub fn write_parsed_common(file: &hdf5::File, truth: &TruthRecord, reco: &DelphesBatch) -> hdf5::Result<hdf5::Group> {
    let truth_group = file.create_group("truth")?;
    write_table(&truth_group, "events", &event_rows(&truth.event_number))?;
    write_table(&truth_group, "tops", &truth.top.to_rows())?;
    write_table(&truth_group, "ws", &truth.w.to_rows())?;
    write_table(&truth_group, "bs", &truth.b.to_rows())?;
    write_table(&truth_group, "w_decays", &truth.w_decay.to_rows())?;

    let reco_group = file.create_group("reco")?;
    write_table(&reco_group, "events", &event_rows(&reco.event_number))?;
    write_table(&reco_group, "jets", &reco.jets.to_rows())?;
    write_table(&reco_group, "electrons", &reco.electrons.to_rows())?;
    write_table(&reco_group, "muons", &reco.muons.to_rows())?;
    write_table(&reco_group, "met", &reco.met.to_rows())?;

    Ok(truth_group)
}

/// Matching datasets for the general (per-class) channels: one row per
/// truth slot plus the per-event summary.
pub fn write_match_record(
    truth_group: &hdf5::Group,
    event_number: &[u32],
    matches: &MatchRecord,
) -> hdf5::Result<()> {
    let mut rows = Vec::with_capacity(matches.pid.flat().len());
    for event in 0..matches.pid.len() {
        for slot in 0..matches.pid.count(event) {
            rows.push(MatchRow {
                event_id: event as u32,
                slot: slot as u32,
                pid: matches.pid.row(event)[slot],
                jet: matches.jet.row(event)[slot],
                electron: matches.electron.row(event)[slot],
                muon: matches.muon.row(event)[slot],
            });
        }
    }
    write_table(truth_group, "match", &rows)?;

    let summary: Vec<MatchSummaryRow> = event_number.iter().enumerate()
        .map(|(i, &number)| MatchSummaryRow {
            event_id: i as u32,
            number,
            fully_matched: matches.fully_matched[i],
            contains_duplicates: matches.contains_duplicates[i],
        })
        .collect();
    write_table(truth_group, "match_summary", &summary)
}

/// Pairing datasets for the tri-W channel. The reordered decay products
/// replace the extraction-ordered `w_decays` table, so downstream readers
/// see them in truth-W slot order.
pub fn write_w_combo(
    truth_group: &hdf5::Group,
    event_number: &[u32],
    combo: &WComboRecord,
) -> hdf5::Result<()> {
    let mut rows = Vec::with_capacity(combo.pairing.flat().len());
    for event in 0..combo.pairing.len() {
        for (slot, &pairing) in combo.pairing.row(event).iter().enumerate() {
            rows.push(WPairingRow { event_id: event as u32, truth_w: slot as u32, pairing });
        }
    }
    write_table(truth_group, "pairings", &rows)?;

    let summary: Vec<WSummaryRow> = event_number.iter().enumerate()
        .map(|(i, &number)| WSummaryRow {
            event_id: i as u32,
            number,
            duplicate_matched: combo.duplicate_matched[i],
            greater_than_0p4: combo.greater_than_0p4[i],
        })
        .collect();
    write_table(truth_group, "pairing_summary", &summary)
}

/// The slice of a parsed file the ML exporters work from.
pub struct ParsedFile {
    pub event_number: Vec<u32>,
    pub w_decay: KinSet,
    pub jets: JetTable,
    pub electrons: LeptonTable,
    pub muons: LeptonTable,
    pub met: MetTable,
}

pub fn read_parsed(path: &Path) -> BoxErr<ParsedFile> {
    let event_number = event_numbers(&path, "reco/events")?;
    let n = event_number.len();
    let w_decays = read_table::<TruthParticleRow>(&path, "truth/w_decays", Bounds::none())?.to_vec();
    let jets = read_table::<JetRow>(&path, "reco/jets", Bounds::none())?.to_vec();
    let electrons = read_table::<LeptonRow>(&path, "reco/electrons", Bounds::none())?.to_vec();
    let muons = read_table::<LeptonRow>(&path, "reco/muons", Bounds::none())?.to_vec();
    let met = read_table::<MetRow>(&path, "reco/met", Bounds::none())?.to_vec();
    Ok(ParsedFile {
        w_decay: KinSet::from_rows(n, &w_decays)?,
        jets: JetTable::from_rows(n, &jets)?,
        electrons: LeptonTable::from_rows(n, &electrons)?,
        muons: LeptonTable::from_rows(n, &muons)?,
        met: MetTable::from_rows(n, &met)?,
        event_number,
    })
}

/// Matching results read back for the all-hadronic export: per-slot jet
/// indices and the per-event full-match flag.
pub struct MatchInfo {
    pub jet: kinematics::Ragged<i64>,
    pub fully_matched: Vec<i32>,
}

pub fn read_match_info(path: &Path) -> BoxErr<MatchInfo> {
    let summary = read_table::<MatchSummaryRow>(&path, "truth/match_summary", Bounds::none())?.to_vec();
    let n = summary.len();
    let rows = read_table::<MatchRow>(&path, "truth/match", Bounds::none())?.to_vec();
    let offsets = crate::tables::event_offsets(n, &rows, |r| r.event_id)?;
    Ok(MatchInfo {
        jet: crate::tables::column(&rows, &offsets, |r| r.jet),
        fully_matched: summary.iter().map(|r| r.fully_matched).collect(),
    })
}

// ----- Tests -----------------------------------------------------------------------------------

#[cfg(test)]
mod test_roundtrip {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_roundtrip() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tables.h5");

        let test_data = vec![
            JetRow { event_id: 0, pt: 120.0, eta: 0.4, phi: -1.0, mass: 12.0, btag: 1 },
            JetRow { event_id: 1, pt: 45.0, eta: -2.1, phi: 0.3, mass: 7.0, btag: 0 },
        ];
        {
            let file = hdf5::File::create(&path)?;
            let group = file.create_group("reco")?;
            write_table(&group, "jets", &test_data)?;
        }
        let read_back = read_table::<JetRow>(&path.as_path(), "reco/jets", Bounds::none())?.to_vec();
        assert_eq!(read_back, test_data);
        Ok(())
    }

    #[test]
    fn bounds_slice_rows() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bounds.h5");
        let rows: Vec<EventRow> = (0..10).map(|i| EventRow { event_id: i, number: 100 + i }).collect();
        {
            let file = hdf5::File::create(&path)?;
            let group = file.create_group("delphes")?;
            write_table(&group, "events", &rows)?;
        }
        let mid = read_table::<EventRow>(&path.as_path(), "delphes/events",
                                         Bounds { min: Some(2), max: Some(5) })?.to_vec();
        assert_eq!(mid, rows[2..5].to_vec());
        Ok(())
    }

    #[test]
    fn staged_file_appears_only_after_persist() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.h5");
        {
            let staged = StagedFile::create(&dest)?;
            staged.file().create_group("truth")?;
            assert!(!dest.exists());
            staged.persist()?;
        }
        assert!(dest.exists());
        Ok(())
    }

    #[test]
    fn abandoned_staged_file_is_cleaned_up() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.h5");
        {
            let staged = StagedFile::create(&dest)?;
            staged.file().create_group("truth")?;
            // dropped without persist: simulated failure
        }
        assert!(!dest.exists());
        assert!(dir.path().read_dir()?.next().is_none(), "no stray .part file may remain");
        Ok(())
    }

    #[test]
    fn nonsequential_event_rows_rejected() -> BoxErr<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.h5");
        let rows = vec![EventRow { event_id: 3, number: 0 }];
        {
            let file = hdf5::File::create(&path)?;
            let group = file.create_group("delphes")?;
            write_table(&group, "events", &rows)?;
        }
        assert!(event_numbers(&path.as_path(), "delphes/events").is_err());
        Ok(())
    }
}
