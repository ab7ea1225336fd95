use std::{collections::HashMap, future::Future};

use tl_view_host::{NodeId, ObserverId, ViewHost};

use tracing::{debug, instrument, trace};

use super::{
	error::Error,
	poller::ElementPoller,
	source::{ChangeSource, NodeRole},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
	pub node: NodeId,
	pub role: NodeRole,
	pub observer: ObserverId,
}

/// Active subscriptions, at most one per node.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
	subscriptions: HashMap<NodeId, Subscription>,
}

impl SubscriptionSet {
	/// Returns `false` without subscribing again if `node` is already in the set.
	pub fn insert<H: ViewHost>(
		&mut self,
		source: &ChangeSource<H>,
		node: NodeId,
		role: NodeRole,
	) -> Result<bool, Error> {
		if self.subscriptions.contains_key(&node) {
			return Ok(false);
		}

		let observer = source.subscribe(node, role)?;
		self.subscriptions.insert(
			node,
			Subscription {
				node,
				role,
				observer,
			},
		);

		Ok(true)
	}

	/// Returns whether `node` was subscribed.
	pub fn remove<H: ViewHost>(&mut self, source: &ChangeSource<H>, node: NodeId) -> bool {
		let Some(subscription) = self.subscriptions.remove(&node) else {
			return false;
		};

		source.unsubscribe(subscription.observer);
		true
	}

	/// Unsubscribes everything, carrying on past observers the host already dropped.
	pub fn clear<H: ViewHost>(&mut self, source: &ChangeSource<H>) {
		for (_, subscription) in self.subscriptions.drain() {
			source.unsubscribe(subscription.observer);
		}
	}

	pub fn get(&self, node: NodeId) -> Option<&Subscription> {
		self.subscriptions.get(&node)
	}

	pub fn contains(&self, node: NodeId) -> bool {
		self.subscriptions.contains_key(&node)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Subscription> + '_ {
		self.subscriptions.values()
	}

	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}
}

/// Observation of the list node and every ancestor up to the root anchor.
///
/// The host replaces the timeline at different depths depending on what happened (scrolling,
/// opening a side panel, switching rooms), so watching only the list would miss most of them.
pub struct SubscriptionTree<H: ViewHost> {
	source: ChangeSource<H>,
	poller: ElementPoller<H>,
	root_class: String,
	list_class: String,
	tracked: Option<NodeId>,
	set: SubscriptionSet,
}

impl<H: ViewHost> SubscriptionTree<H> {
	pub fn new(
		source: ChangeSource<H>,
		poller: ElementPoller<H>,
		root_class: impl Into<String>,
		list_class: impl Into<String>,
	) -> Self {
		Self {
			source,
			poller,
			root_class: root_class.into(),
			list_class: list_class.into(),
			tracked: None,
			set: SubscriptionSet::default(),
		}
	}

	/// The list node observation is currently attached to.
	pub const fn tracked(&self) -> Option<NodeId> {
		self.tracked
	}

	pub const fn subscriptions(&self) -> &SubscriptionSet {
		&self.set
	}

	/// Whether the tracked list is still the one the host renders.
	///
	/// Only identity counts: a freshly rendered list with the exact same content is still a
	/// replacement.
	pub async fn is_alive(&self) -> bool {
		self.is_current(self.list_lookup().await)
	}

	/// Liveness verdict for a list resolved elsewhere, `resolved` being the lookup's answer.
	pub fn is_current(&self, resolved: Option<NodeId>) -> bool {
		self.tracked.is_some() && resolved == self.tracked
	}

	/// Single lookup of the list anchor, without waiting for it to be rendered.
	pub fn locate_list(&self) -> Option<NodeId> {
		self.poller.find_now(&self.list_class)
	}

	/// Full bounded lookup of the list anchor, detached from `self` so it can run on its own task.
	pub fn list_lookup(&self) -> impl Future<Output = Option<NodeId>> + Send + 'static {
		let poller = self.poller.clone();
		let list_class = self.list_class.clone();

		async move { poller.wait_for_class(&list_class).await }
	}

	/// Drops every subscription, then observes the freshly resolved list and its ancestor chain.
	///
	/// Returns the new list node, or `None` if an anchor could not be found. When only the list
	/// is missing the root anchor stays observed, so its next insertion can retry.
	#[instrument(skip(self), fields(previous = ?self.tracked), err)]
	pub async fn resubscribe(&mut self) -> Result<Option<NodeId>, Error> {
		self.teardown();

		let Some(root) = self.poller.wait_for_class(&self.root_class).await else {
			debug!(root_class = %self.root_class, "Root anchor not found;");
			return Ok(None);
		};

		let Some(list) = self.poller.wait_for_class(&self.list_class).await else {
			debug!(list_class = %self.list_class, "List anchor not found, watching root only;");
			if let Err(e) = self.set.insert(&self.source, root, NodeRole::Root) {
				self.teardown();
				return Err(e);
			}
			return Ok(None);
		};

		if let Err(e) = self.subscribe_chain(list, root) {
			self.teardown();
			return Err(e);
		}

		self.tracked = Some(list);

		trace!(%list, subscriptions = self.set.len(), "Subscribed to list chain;");

		Ok(Some(list))
	}

	fn subscribe_chain(&mut self, list: NodeId, root: NodeId) -> Result<(), Error> {
		let mut cursor = Some(list);

		while let Some(node) = cursor {
			if node == root {
				break;
			}

			let role = if node == list {
				NodeRole::List
			} else {
				NodeRole::Ancestor
			};
			self.set.insert(&self.source, node, role)?;

			cursor = self.source.host().parent(node);
		}

		if cursor.is_none() {
			debug!(%list, %root, "List is not under the root anchor;");
		}

		self.set.insert(&self.source, root, NodeRole::Root)?;

		Ok(())
	}

	pub fn teardown(&mut self) {
		self.tracked = None;
		self.set.clear(&self.source);
	}
}

impl<H: ViewHost> Drop for SubscriptionTree<H> {
	fn drop(&mut self) {
		// Host observers outlive us otherwise.
		self.teardown();
	}
}
