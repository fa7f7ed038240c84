use clap::Parser;
use commands::clean::Clean;
use git::Git;

mod backup;
mod classifier;
mod commands;
mod errors;
mod git;
mod github;
mod probe;

#[derive(Debug, Parser)]
#[command(name = "gitclean", version)]
#[command(
    about = "Clean up local git branches that have been merged or squashed into a target branch.",
    long_about = None
)]
struct Cli {
    /// Set log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    clean: Clean,
}

fn main() {
    let args = Cli::parse();

    let filter = match args.log_level.to_lowercase().as_str() {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        other => {
            eprintln!("Unknown log level: {}, defaulting to info", other);
            log::LevelFilter::Info
        }
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();

    let git = match Git::open(".") {
        Ok(git) => git,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = args.clean.execute(git) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
