pub mod eval;
pub mod schema;

// -----------------------------------------------------------------------------
// Cmd
// -----------------------------------------------------------------------------
pub trait Cmd {
    fn run(&self) -> anyhow::Result<()>;
}

// -----------------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Evaluate a sample expression and its gradients
    Eval(eval::Args),

    /// Print JSON schema of the graph configuration
    Schema(schema::Args),
}

impl Cmd for Commands {
    fn run(&self) -> anyhow::Result<()> {
        match self {
            Commands::Eval(args) => args.run(),
            Commands::Schema(args) => args.run(),
        }
    }
}
