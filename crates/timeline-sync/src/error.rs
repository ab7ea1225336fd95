use tl_view_host::HostError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Host(#[from] HostError),
	#[error("invalid configuration: {0}")]
	Config(#[from] serde_json::Error),
	#[error("synchronizer is not running")]
	Stopped,
}
