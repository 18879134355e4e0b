use fat_slack::Disk;
use fat_slack::args::{Args, USAGE};
use fat_slack::partition::disk_error::DiskError;
use fat_slack::traits::TreeDisplay;
use log::error;
use std::env;
use std::process::ExitCode;

/// Exit code of a run aborted by an I/O or format error.
const EXIT_FATAL: u8 = 1;
/// Exit code of a malformed command line.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // warn by default, debug with -v
    let verbosity: usize = if args.verbose { 3 } else { 1 };
    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .module("fat_slack")
        .verbosity(verbosity)
        .init()
    {
        eprintln!("Failed to initialize logging: {err}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: &Args) -> Result<(), DiskError> {
    let disk = Disk::open(&args.image_path, args.fs_type, args.scan_options())?;

    match disk.layout(3) {
        Ok(layout) => print!("{layout}"),
        Err(err) => error!("Print layout error: {err}"),
    }

    for vol in disk.volumes() {
        println!("\n{}", vol.bpb());

        if let Some(diff) = vol.fat_diff() {
            print!("{diff}");
        }
        if args.verbose {
            match vol.table() {
                Some(table) => print!("\n{table}"),
                None => println!("\nFAT dump is not available for {} volumes.", vol.fat_type()),
            }
        }

        match vol.display_tree() {
            Ok(tree) => print!("\n{tree}"),
            Err(err) => error!("Tree printing failed: {err}"),
        }
    }

    if args.hidden {
        println!();
        for finding in disk.findings() {
            println!("{finding}");
        }
        if !disk.hidden_data_found() {
            println!("No hidden data found.");
        }
    }

    Ok(())
}
