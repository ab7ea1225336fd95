use std::{sync::Arc, time::Duration};

use tl_view_host::{NodeId, ViewHost};

use tokio::time::sleep;
use tracing::{debug, trace};

use super::config::SyncConfig;

/// Resolves anchor nodes that the host renders asynchronously.
///
/// Each lookup is independent: it checks the host, and if nothing matches yet, sleeps and tries
/// again until the attempt budget runs out.
pub struct ElementPoller<H> {
	host: Arc<H>,
	attempts: u32,
	interval: Duration,
}

impl<H: ViewHost> ElementPoller<H> {
	pub const fn new(host: Arc<H>, attempts: u32, interval: Duration) -> Self {
		Self {
			host,
			attempts,
			interval,
		}
	}

	pub fn from_config(host: Arc<H>, config: &SyncConfig) -> Self {
		Self::new(host, config.poll_attempts, config.poll_interval())
	}

	/// One attempt, no waiting.
	pub fn find_now(&self, class: &str) -> Option<NodeId> {
		self.host.find_first_by_class(class)
	}

	/// First node carrying `class`, or `None` once every attempt came back empty.
	pub async fn wait_for_class(&self, class: &str) -> Option<NodeId> {
		for attempt in 1..=self.attempts {
			if let Some(node) = self.find_now(class) {
				return Some(node);
			}

			if attempt < self.attempts {
				trace!(%class, attempt, "Anchor not rendered yet, waiting;");
				sleep(self.interval).await;
			}
		}

		debug!(%class, attempts = self.attempts, "Gave up waiting for anchor;");

		None
	}
}

impl<H> Clone for ElementPoller<H> {
	fn clone(&self) -> Self {
		Self {
			host: Arc::clone(&self.host),
			attempts: self.attempts,
			interval: self.interval,
		}
	}
}
