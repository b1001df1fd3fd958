use std::path::PathBuf;

use qbackprop::GraphConfig;

use super::Cmd;

// -----------------------------------------------------------------------------
// Args
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Output file. Print to stdout if omitted
    #[clap(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let schema = schemars::schema_for!(GraphConfig);
        let json = serde_json::to_string_pretty(&schema)?;

        match &self.output {
            Some(path) => {
                log::info!("Writing schema to {:?}", path);
                std::fs::write(path, json)?;
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}
