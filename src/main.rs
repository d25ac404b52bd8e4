use clap::Parser;
use storhy::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    storhy::cli::run(&cli)
}
