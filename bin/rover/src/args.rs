//! CLI argument parsing.

use std::path::PathBuf;

use argh::FromArgs;
use rover_primitives::ChainTag;

#[derive(Clone, Debug, FromArgs)]
#[argh(description = "Multi-chain rover worker")]
pub(crate) struct Args {
    /// path to the configuration toml; defaults apply when omitted
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: Option<PathBuf>,

    /// which foreign chain this worker observes.
    #[argh(option, description = "chain to rove (eth | lsk)")]
    pub chain: ChainTag,

    /// run without a parent coordinator: validate and log, emit nothing.
    #[argh(switch, description = "standalone mode")]
    pub standalone: bool,

    /// Other generic overrides to the config toml.
    /// Will be used, for example, as `-o eth.maximum_peers=30 -o client.network=test`
    #[argh(option, short = 'o', description = "generic config overrides")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Override strings gathered from explicit flags and `-o` options.
    pub(crate) fn get_all_overrides(&self) -> Vec<String> {
        let mut overrides = self.overrides.clone();
        if self.standalone {
            overrides.push("client.standalone=true".to_string());
        }
        overrides
    }
}
