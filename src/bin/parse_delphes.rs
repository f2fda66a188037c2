use std::path::PathBuf;

use clap::Parser;

use truthmatch::BoxErr;
use truthmatch::config::{read_config_file, MatchConfig};
use truthmatch::io::hdf5::{read_delphes, write_match_record, write_parsed_common, write_w_combo, StagedFile};
use truthmatch::matching::{do_matching, MatchRecord};
use truthmatch::truth::{extract_truth, TruthRecord, FOUR_TOP, TRI_TOP};
use truthmatch::utils::{group_digits, timing::Progress};
use truthmatch::wcombo::{reconstruct_w_pairings, WComboRecord};

#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "parse_delphes",
    about = "Extract truth particles, match them to reconstructed objects, write truth/reco tables",
    subcommand_precedence_over_arg = true,
)]
pub struct Cli {
    /// Converter-level HDF5 input file with particle and reco tables
    pub infile: PathBuf,

    /// HDF5 output file for the parsed truth/reco tables
    #[clap(short, long)]
    pub out: PathBuf,

    /// TOML file overriding the ΔR matching thresholds
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    channel: Channel,
}

#[derive(clap::Subcommand, Debug, Clone)]
enum Channel {

    /// Four-top events: ΔR-match all twelve truth slots to jets and leptons
    FourTop,

    /// Three-top events: truth extraction and validation only
    TriTop,

    /// Three-top-plus-jet events: combinatorial W pairing of the six decay products
    TriW,
}

/// Channel-specific derived data, computed in full before anything is
/// written so a failure never leaves a partial output file.
enum Derived {
    Matches(MatchRecord),
    Pairings(WComboRecord),
    TruthOnly,
}

fn main() -> BoxErr<()> {
    let args = Cli::parse();
    let config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => MatchConfig::default(),
    };

    let mut progress = Progress::new();

    progress.start(&format!("Loading {}", args.infile.display()));
    let batch = read_delphes(&args.infile)?;
    progress.done_with_message(&format!("{} events", group_digits(batch.n_events())));

    let spec = match args.channel {
        Channel::FourTop => &FOUR_TOP,
        Channel::TriTop | Channel::TriW => &TRI_TOP,
    };
    progress.start(&format!("Extracting {} truth record", spec.name));
    let truth = extract_truth(&batch, spec)?;
    progress.done();

    let (truth, derived) = match args.channel {
        Channel::FourTop => {
            progress.start("Matching truth slots to reconstructed objects");
            let matches = do_matching(&truth, &batch, &config, spec.max_index());
            progress.done();
            let matched = matches.fully_matched.iter().filter(|&&f| f == 1).count();
            println!("   {} / {} events fully matched ({}%)",
                     group_digits(matched), group_digits(batch.n_events()),
                     100 * matched / batch.n_events().max(1));
            (truth, Derived::Matches(matches))
        }
        Channel::TriTop => (truth, Derived::TruthOnly),
        Channel::TriW => {
            progress.start("Assigning W decay pairings");
            let combo = reconstruct_w_pairings(&truth, config.w_dr_max)?;
            progress.done();
            let clean = combo.duplicate_matched.iter().filter(|&&d| d == 0).count();
            println!("   {} / {} events uniquely paired",
                     group_digits(clean), group_digits(batch.n_events()));
            // downstream readers want the decay products in truth-W slot order
            let truth = TruthRecord { w_decay: combo.decay.clone(), ..truth };
            (truth, Derived::Pairings(combo))
        }
    };

    progress.start(&format!("Writing {}", args.out.display()));
    let staged = StagedFile::create(&args.out)?;
    let truth_group = write_parsed_common(staged.file(), &truth, &batch)?;
    match &derived {
        Derived::Matches(matches) => write_match_record(&truth_group, &truth.event_number, matches)?,
        Derived::Pairings(combo) => write_w_combo(&truth_group, &truth.event_number, combo)?,
        Derived::TruthOnly => {}
    }
    staged.persist()?;
    progress.done();

    Ok(())
}
