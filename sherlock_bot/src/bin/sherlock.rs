use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file location
    #[arg(short, long)]
    config: PathBuf,

    /// Run in foreground without daemonising
    #[arg(short, long)]
    foreground: bool,
}

pub fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    sherlock_bot::run::run_bot(args.config, args.foreground)
}
