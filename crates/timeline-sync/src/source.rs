use std::sync::Arc;

use tl_view_host::{HostError, NodeId, ObserverId, ViewHost};

use async_channel as chan;
use tracing::{debug, error, trace};

/// Where an observed node sits in the chain between the list and the root anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
	List,
	Ancestor,
	Root,
}

/// Children were inserted under an observed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
	pub node: NodeId,
	pub role: NodeRole,
	pub added: usize,
}

/// Child-insertion notifications over the host's child-list observers.
///
/// Every subscription forwards into the same channel, so the owner of the receiving end sees all
/// insertions in one place. Removals are not forwarded.
pub struct ChangeSource<H> {
	host: Arc<H>,
	insertions_tx: chan::Sender<Insertion>,
}

impl<H: ViewHost> ChangeSource<H> {
	pub fn new(host: Arc<H>) -> (Self, chan::Receiver<Insertion>) {
		let (insertions_tx, insertions_rx) = chan::unbounded();

		(
			Self {
				host,
				insertions_tx,
			},
			insertions_rx,
		)
	}

	pub fn subscribe(&self, node: NodeId, role: NodeRole) -> Result<ObserverId, HostError> {
		let insertions_tx = self.insertions_tx.clone();

		self.host.observe_child_list(
			node,
			Box::new(move |record| {
				if !record.has_added_nodes() {
					return;
				}

				if insertions_tx.is_closed() {
					trace!(%node, "Dropping insertion for a closed channel;");
					return;
				}

				// Unbounded, so never full
				if insertions_tx
					.try_send(Insertion {
						node,
						role,
						added: record.added.len(),
					})
					.is_err()
				{
					error!(%node, "Unable to forward child insertion;");
				}
			}),
		)
	}

	/// Never fails: the host may already have torn the observer down on its own.
	pub fn unsubscribe(&self, observer: ObserverId) {
		if let Err(e) = self.host.disconnect(observer) {
			debug!(?e, %observer, "Ignoring failed unsubscribe;");
		}
	}

	pub fn host(&self) -> &Arc<H> {
		&self.host
	}
}
