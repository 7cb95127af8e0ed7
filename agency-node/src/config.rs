use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub type Error = Box<dyn std::error::Error>;

/// Agency process configuration, resolved before the protocol engine
/// starts.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub agency_id: String,
    pub server_address: SocketAddr,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub data_file: PathBuf,
}

pub fn load(path: &Path) -> Result<Config, Error> {
    let file = std::fs::File::open(path)?;
    let config = serde_yaml::from_reader(file)?;
    Ok(config)
}
