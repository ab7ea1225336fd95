use std::fmt;

use super::error::HostError;

/// Identity of a node in the host tree.
///
/// Ids are never reused by a host, so two equal ids always refer to the same live or discarded
/// node. Liveness checks compare ids, never node contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u64);

impl NodeId {
	#[must_use]
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	#[must_use]
	pub const fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "node#{}", self.0)
	}
}

/// Handle of a registered child-list observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObserverId(u64);

impl ObserverId {
	#[must_use]
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}
}

impl fmt::Display for ObserverId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "observer#{}", self.0)
	}
}

/// A batch of direct-children changes on `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
	pub target: NodeId,
	pub added: Vec<NodeId>,
	pub removed: Vec<NodeId>,
}

impl MutationRecord {
	#[must_use]
	pub fn has_added_nodes(&self) -> bool {
		!self.added.is_empty()
	}
}

pub type MutationCallback = Box<dyn Fn(&MutationRecord) + Send + Sync + 'static>;

/// The rendered view tree owned by the host application.
///
/// Everything is read or observe only, except for the presentation vocabulary: classes and
/// attributes. Reads on a node the host already discarded return empty answers instead of
/// failing.
pub trait ViewHost: Send + Sync + 'static {
	/// First node in document order carrying `class`.
	fn find_first_by_class(&self, class: &str) -> Option<NodeId>;

	/// Descendants of `within`, in document order, carrying `class`.
	fn find_all_by_class(&self, within: NodeId, class: &str) -> Vec<NodeId>;

	fn parent(&self, node: NodeId) -> Option<NodeId>;

	fn children(&self, node: NodeId) -> Vec<NodeId>;

	/// Lowercase element name.
	fn tag(&self, node: NodeId) -> Option<String>;

	fn has_class(&self, node: NodeId, class: &str) -> bool;

	fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

	/// Returns `true` if the class was not present before.
	fn add_class(&self, node: NodeId, class: &str) -> Result<bool, HostError>;

	/// Returns `true` if the class was present before.
	fn remove_class(&self, node: NodeId, class: &str) -> Result<bool, HostError>;

	fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;

	/// Registers `callback` to be called for every change to the direct children of `node`.
	fn observe_child_list(
		&self,
		node: NodeId,
		callback: MutationCallback,
	) -> Result<ObserverId, HostError>;

	fn disconnect(&self, observer: ObserverId) -> Result<(), HostError>;
}
