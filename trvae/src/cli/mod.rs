pub mod demo;

use clap::{Parser, Subcommand};

pub use demo::DemoArgs;

#[derive(Parser)]
#[command(name = "trvae")]
#[command(about = "Rotation/translation-invariant VAE on candle tensors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate randomly posed blob images and fit the invariant VAE
    Demo(DemoArgs),
}
