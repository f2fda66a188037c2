use std::path::PathBuf;

use clap::Parser;

use truthmatch::BoxErr;
use truthmatch::export::nu2flows::{build_tables, write_split};
use truthmatch::io::hdf5::read_parsed;
use truthmatch::selection::lepton_channel_mask;
use truthmatch::utils::{group_digits, timing::Progress};

#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "make_nu2flows",
    about = "Select a lepton-multiplicity channel and export padded training tables",
)]
pub struct Cli {
    /// Parsed truth/reco HDF5 file
    pub infile: PathBuf,

    /// Output basename; `_train.h5` and `_test.h5` are appended
    #[clap(short, long)]
    pub out: String,

    /// Number of reconstructed light leptons selecting the channel
    #[clap(short, long, default_value = "1")]
    pub leptons: usize,

    /// Every n-th selected event goes to the test file
    #[clap(short, long, default_value = "10")]
    pub split_ratio: usize,
}

fn main() -> BoxErr<()> {
    let args = Cli::parse();
    let mut progress = Progress::new();

    progress.start(&format!("Loading {}", args.infile.display()));
    let parsed = read_parsed(&args.infile)?;
    progress.done_with_message(&format!("{} events", group_digits(parsed.event_number.len())));

    progress.start(&format!("Selecting the {}-lepton channel", args.leptons));
    let mask = lepton_channel_mask(
        &parsed.w_decay.pid,
        &parsed.electrons.multiplicity(),
        &parsed.muons.multiplicity(),
        args.leptons,
    )?;
    progress.done_with_message(&format!("{} events pass", group_digits(mask.n_pass)));

    progress.start("Building padded tables");
    let tables = build_tables(&parsed, &mask)?;
    progress.done();

    progress.start(&format!("Writing {}_train.h5 and {0}_test.h5", args.out));
    write_split(&args.out, &tables, args.split_ratio)?;
    progress.done();

    Ok(())
}
