use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use truthmatch::BoxErr;
use truthmatch::io::hdf5::{write_table, StagedFile};
use truthmatch::io::lhe::{bucket_by_species, read_lhe, LheEvent};
use truthmatch::utils::group_digits;

#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "lhe2h5",
    about = "Convert parton-level LHE files into per-species kinematic tables",
)]
pub struct Cli {
    /// LHE input files (plain or gzipped); events are concatenated in order
    pub infiles: Vec<PathBuf>,

    /// HDF5 output file
    #[clap(short, long)]
    pub out: PathBuf,
}

fn main() -> BoxErr<()> {
    let args = Cli::parse();
    if args.infiles.is_empty() {
        return Err("no input files given".into());
    }

    let files_pb = ProgressBar::new(args.infiles.len() as u64)
        .with_message(args.infiles[0].display().to_string());
    files_pb.set_style(ProgressStyle::default_bar()
                       .template("Reading file: {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")
                       .unwrap_or_else(|_| ProgressStyle::default_bar()));
    files_pb.tick();

    let mut events: Vec<LheEvent> = vec![];
    for infile in &args.infiles {
        files_pb.set_message(format!("{}. {} events so far.",
                                     infile.display(), group_digits(events.len())));
        events.extend(read_lhe(infile)?);
        files_pb.inc(1);
    }
    files_pb.finish_with_message("<finished reading files>");
    println!("Read {} events from {} files",
             group_digits(events.len()), group_digits(args.infiles.len()));

    let buckets = bucket_by_species(&events)?;

    println!("Writing {} species tables to {}", buckets.len(), args.out.display());
    let staged = StagedFile::create(&args.out)?;
    let group = staged.file().create_group("particles")?;
    for (name, rows) in &buckets {
        write_table(&group, name, rows)?;
    }
    staged.persist()?;
    println!("Complete");

    Ok(())
}
