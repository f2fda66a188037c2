//! End-to-end pipeline checks over a synthetic batch: converter tables on
//! disk → truth extraction → ΔR matching → parsed file → channel selection
//! → padded export.

use truthmatch::BoxErr;
use truthmatch::config::MatchConfig;
use truthmatch::export::nu2flows;
use truthmatch::io::hdf5::{
    read_delphes, read_match_info, read_parsed, write_match_record, write_parsed_common,
    write_table, StagedFile,
};
use truthmatch::matching::{do_matching, UNMATCHED};
use truthmatch::selection::lepton_channel_mask;
use truthmatch::tables::{EventRow, JetRow, LeptonRow, MetRow, ParticleRow};
use truthmatch::truth::{extract_truth, ChannelSpec};

/// A toy single-top channel keeps the synthetic events small: one b quark
/// and two W decay products per event, three matchable slots.
const SINGLE_TOP: ChannelSpec = ChannelSpec {
    name: "single-top",
    n_top: 1,
    n_w: 1,
    n_b: Some(1),
    n_w_decay: 2,
};

struct EventSpec {
    number: u32,
    /// (pid, mother, status, eta, phi)
    particles: Vec<(i32, i32, i32, f64, f64)>,
    /// (eta, phi, btag)
    jets: Vec<(f64, f64, u8)>,
    /// (eta, phi, charge)
    electrons: Vec<(f64, f64, i32)>,
}

fn leptonic_event(number: u32, eta0: f64) -> EventSpec {
    EventSpec {
        number,
        particles: vec![
            (6, -1, 22, eta0, 0.0),          // top
            (24, 0, 22, eta0, 1.0),          // W
            (5, 0, 23, eta0, -1.0),          // b
            (11, 1, 23, eta0, 1.1),          // e from the W
            (-12, 1, 23, eta0, 2.5),         // neutrino
        ],
        jets: vec![(eta0 + 0.05, -1.0, 1), (eta0 + 2.0, 0.5, 0)],
        electrons: vec![(eta0, 1.12, -1)],
    }
}

fn hadronic_event(number: u32) -> EventSpec {
    EventSpec {
        number,
        particles: vec![
            (6, -1, 22, 0.0, 0.0),
            (24, 0, 22, 0.0, 1.0),
            (5, 0, 23, 0.0, -1.0),
            (2, 1, 23, 0.1, 1.0),
            (-1, 1, 23, -0.1, 1.2),
        ],
        jets: vec![(0.0, -1.0, 1), (0.1, 1.0, 0), (-0.1, 1.2, 0)],
        electrons: vec![],
    }
}

fn write_input(path: &std::path::Path, events: &[EventSpec]) -> BoxErr<()> {
    let mut event_rows = vec![];
    let mut particle_rows = vec![];
    let mut jet_rows = vec![];
    let mut electron_rows = vec![];
    let mut met_rows = vec![];
    for (event_id, spec) in events.iter().enumerate() {
        let event_id = event_id as u32;
        event_rows.push(EventRow { event_id, number: spec.number });
        for &(pid, mother, status, eta, phi) in &spec.particles {
            particle_rows.push(ParticleRow {
                event_id, pid, status, mother,
                pt: 50.0, eta, phi, energy: 120.0, mass: 0.0,
            });
        }
        for &(eta, phi, btag) in &spec.jets {
            jet_rows.push(JetRow { event_id, pt: 80.0, eta, phi, mass: 8.0, btag });
        }
        for &(eta, phi, charge) in &spec.electrons {
            electron_rows.push(LeptonRow { event_id, pt: 35.0, eta, phi, charge });
        }
        met_rows.push(MetRow { event_id, met: 20.0, eta: 0.0, phi: 0.4 });
    }

    let staged = StagedFile::create(path)?;
    let group = staged.file().create_group("delphes")?;
    write_table(&group, "events", &event_rows)?;
    write_table(&group, "particles", &particle_rows)?;
    write_table(&group, "jets", &jet_rows)?;
    write_table(&group, "electrons", &electron_rows)?;
    write_table(&group, "muons", &[] as &[LeptonRow])?;
    write_table(&group, "met", &met_rows)?;
    staged.persist()
}

/// Run the parse stage over a three-event batch and write the parsed file.
fn parse_stage(input: &std::path::Path, output: &std::path::Path) -> BoxErr<()> {
    let batch = read_delphes(input)?;
    let truth = extract_truth(&batch, &SINGLE_TOP)?;
    let matches = do_matching(&truth, &batch, &MatchConfig::default(), SINGLE_TOP.max_index());

    // event 0: b → jet 0, e → electron 0, ν unmatched
    assert_eq!(matches.jet.row(0), &[0, UNMATCHED, UNMATCHED]);
    assert_eq!(matches.electron.row(0), &[UNMATCHED, 0, UNMATCHED]);

    let staged = StagedFile::create(output)?;
    let truth_group = write_parsed_common(staged.file(), &truth, &batch)?;
    write_match_record(&truth_group, &truth.event_number, &matches)?;
    staged.persist()
}

#[test]
fn selection_filters_one_event_out_of_three() -> BoxErr<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("delphes.h5");
    let parsed_path = dir.path().join("parsed.h5");

    write_input(&input, &[
        leptonic_event(500, 0.0),
        hadronic_event(501),
        leptonic_event(502, 1.0),
    ])?;
    parse_stage(&input, &parsed_path)?;

    let parsed = read_parsed(&parsed_path)?;
    assert_eq!(parsed.event_number, vec![500, 501, 502]);

    let mask = lepton_channel_mask(
        &parsed.w_decay.pid,
        &parsed.electrons.multiplicity(),
        &parsed.muons.multiplicity(),
        1,
    )?;
    assert_eq!(mask.keep, vec![true, false, true]);

    // every derived dataset must come out with exactly the two surviving rows
    let tables = nu2flows::build_tables(&parsed, &mask)?;
    assert_eq!(tables.jets.nrows(), 2);
    assert_eq!(tables.leptons.nrows(), 2);
    assert_eq!(tables.neutrinos.nrows(), 2);
    assert_eq!(tables.met.len(), 2);
    assert_eq!(tables.event_number, vec![500, 502]);

    // jet width covers the widest event of the file even though that event
    // (the hadronic one, three jets) was filtered out
    assert_eq!(tables.jets.shape(), &[2, 3]);
    Ok(())
}

#[test]
fn matching_results_survive_the_file_roundtrip() -> BoxErr<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("delphes.h5");
    let parsed_path = dir.path().join("parsed.h5");

    write_input(&input, &[leptonic_event(7, 0.0), hadronic_event(8)])?;
    parse_stage(&input, &parsed_path)?;

    let matches = read_match_info(&parsed_path)?;
    assert_eq!(matches.jet.row(0), &[0, UNMATCHED, UNMATCHED]);
    // hadronic event: b → jet 0, u → jet 1, dbar → jet 2: complete
    assert_eq!(matches.jet.row(1), &[0, 1, 2]);
    assert_eq!(matches.fully_matched, vec![0, 1]);
    Ok(())
}
