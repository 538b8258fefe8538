use anyhow::Result;
use clap::Parser;
use trvae::cli::{demo, Cli, Commands};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Demo(args) => {
            demo::run(args)?;
        }
    }

    Ok(())
}
