use clap::Parser;
use cmds::Cmd;

mod cmds;

#[derive(Debug, Parser)]
struct Cli {
    /// Show logs of the engine
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: cmds::Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Warn
    };
    env_logger::builder().filter_level(level).init();

    log::info!("{:?}", cli);
    cli.command.run()
}
