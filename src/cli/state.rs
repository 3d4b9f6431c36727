use std::path::PathBuf;

use clap::Parser;

use crate::store::JsonFileStore;

#[derive(Parser)]
pub struct StateArgs {
    /// Where the learned curve is kept.
    #[clap(long = "state-file", env = "STATE_FILE", default_value = "curve.json")]
    pub path: PathBuf,
}

impl StateArgs {
    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.path)
    }
}
