use anyhow::Result;
use clap::Parser;
use sharecrawl::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
