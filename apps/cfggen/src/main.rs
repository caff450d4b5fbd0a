//! Partition scenario compiler.
//!
//! Reads a TOML scenario, proves the declared layout consistent and writes
//! the VM configuration header (and optionally the board defconfig fragment)
//! for the hypervisor build. A rejected scenario prints every collected
//! violation and exits nonzero.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(version, about = "Compile a partitioning scenario into build-time VM configuration")]
struct Args {
    /// Path to the scenario TOML file
    scenario: PathBuf,

    /// Write the VM configuration header here instead of stdout
    #[clap(long, short = 'o')]
    output: Option<PathBuf>,

    /// Also write the board defconfig fragment
    #[clap(long)]
    defconfig: Option<PathBuf>,

    /// Log verbosely. Specify multiple times for more verbosity.
    #[clap(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    colog::default_builder().filter_level(level).init();

    process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let text = match fs::read_to_string(&args.scenario) {
        Ok(text) => text,
        Err(err) => {
            log::error!("cannot read {}: {}", args.scenario.display(), err);
            return 1;
        }
    };

    let (config, limits) = match axvmcfg::scenario::parse(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::error!("{}", err);
            return 1;
        }
    };

    let frozen = match config.validate(&limits) {
        Ok(frozen) => frozen,
        Err(errors) => {
            for err in &errors {
                log::error!("{}", err);
            }
            log::error!("scenario rejected with {} violation(s)", errors.len());
            return 1;
        }
    };

    let header = axvmcfg::emit(&frozen);
    match &args.output {
        Some(path) => {
            if let Err(err) = fs::write(path, &header) {
                log::error!("cannot write {}: {}", path.display(), err);
                return 1;
            }
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", header),
    }

    if let Some(path) = &args.defconfig {
        match axvmcfg::emit_defconfig(&frozen) {
            Some(defconfig) => {
                if let Err(err) = fs::write(path, defconfig) {
                    log::error!("cannot write {}: {}", path.display(), err);
                    return 1;
                }
                log::info!("wrote {}", path.display());
            }
            None => {
                log::error!("--defconfig requires a [hypervisor] section in the scenario");
                return 1;
            }
        }
    }

    0
}
