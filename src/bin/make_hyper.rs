use std::path::PathBuf;

use clap::Parser;

use truthmatch::BoxErr;
use truthmatch::export::hyper;
use truthmatch::io::hdf5::{read_match_info, read_parsed};
use truthmatch::utils::{group_digits, timing::Progress};

#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "make_hyper",
    about = "Export all-hadronic jet inputs and assignment labels for hypergraph training",
)]
pub struct Cli {
    /// Parsed truth/reco HDF5 file with matching datasets
    pub infile: PathBuf,

    /// HDF5 output file
    #[clap(short, long)]
    pub out: PathBuf,
}

fn main() -> BoxErr<()> {
    let args = Cli::parse();
    let mut progress = Progress::new();

    progress.start(&format!("Loading {}", args.infile.display()));
    let parsed = read_parsed(&args.infile)?;
    let matches = read_match_info(&args.infile)?;
    progress.done_with_message(&format!("{} events", group_digits(parsed.event_number.len())));

    progress.start("Building jet inputs and labels");
    let tables = hyper::build_tables(&parsed, &matches)?;
    progress.done();

    let selected = tables.index_select.iter().filter(|&&s| s == 1).count();
    println!("   {} / {} events carry a complete assignment",
             group_digits(selected), group_digits(tables.index_select.len()));

    progress.start(&format!("Writing {}", args.out.display()));
    hyper::write(&args.out, &tables)?;
    progress.done();

    Ok(())
}
