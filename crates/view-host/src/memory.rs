use std::{
	collections::{BTreeMap, HashMap},
	fmt,
	sync::Arc,
};

use parking_lot::RwLock;
use tracing::trace;

use super::{
	error::HostError,
	host::{MutationCallback, MutationRecord, NodeId, ObserverId, ViewHost},
};

type SharedCallback = Arc<dyn Fn(&MutationRecord) + Send + Sync + 'static>;

#[derive(Debug)]
struct Element {
	tag: String,
	classes: Vec<String>,
	attributes: BTreeMap<String, String>,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

struct Observer {
	target: NodeId,
	callback: SharedCallback,
}

struct Tree {
	next_id: u64,
	document: NodeId,
	elements: HashMap<NodeId, Element>,
	observers: BTreeMap<ObserverId, Observer>,
}

impl Tree {
	fn allocate(&mut self) -> u64 {
		self.next_id += 1;
		self.next_id
	}

	fn element(&self, node: NodeId) -> Result<&Element, HostError> {
		self.elements.get(&node).ok_or(HostError::NodeNotFound(node))
	}

	fn element_mut(&mut self, node: NodeId) -> Result<&mut Element, HostError> {
		self.elements
			.get_mut(&node)
			.ok_or(HostError::NodeNotFound(node))
	}

	fn callbacks_for(&self, target: NodeId) -> Vec<SharedCallback> {
		self.observers
			.values()
			.filter(|observer| observer.target == target)
			.map(|observer| Arc::clone(&observer.callback))
			.collect()
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}

			match self.elements.get(&node).and_then(|element| element.parent) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	/// Detaches `child` from its current parent, returning the record for that parent.
	fn detach(&mut self, child: NodeId) -> Result<Option<MutationRecord>, HostError> {
		let Some(old_parent) = self.element(child)?.parent else {
			return Ok(None);
		};

		self.element_mut(old_parent)?
			.children
			.retain(|sibling| *sibling != child);
		self.element_mut(child)?.parent = None;

		Ok(Some(MutationRecord {
			target: old_parent,
			added: vec![],
			removed: vec![child],
		}))
	}

	/// Pre-order walk over the descendants of `from`, excluding `from` itself.
	fn descendants(&self, from: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack = self
			.elements
			.get(&from)
			.map(|element| element.children.iter().rev().copied().collect::<Vec<_>>())
			.unwrap_or_default();

		while let Some(node) = stack.pop() {
			out.push(node);
			if let Some(element) = self.elements.get(&node) {
				stack.extend(element.children.iter().rev().copied());
			}
		}

		out
	}
}

/// An in-memory view tree.
///
/// Removed sub-trees are never freed, they just become detached: handles kept by observers stay
/// readable the same way a discarded DOM node does.
pub struct MemoryHost {
	tree: RwLock<Tree>,
}

impl MemoryHost {
	#[must_use]
	pub fn new() -> Self {
		let document = NodeId::new(1);

		Self {
			tree: RwLock::new(Tree {
				next_id: 1,
				document,
				elements: HashMap::from([(
					document,
					Element {
						tag: "body".to_string(),
						classes: vec![],
						attributes: BTreeMap::new(),
						parent: None,
						children: vec![],
					},
				)]),
				observers: BTreeMap::new(),
			}),
		}
	}

	#[must_use]
	pub fn document(&self) -> NodeId {
		self.tree.read().document
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str, classes: &[&str]) -> NodeId {
		let mut tree = self.tree.write();
		let node = NodeId::new(tree.allocate());

		tree.elements.insert(
			node,
			Element {
				tag: tag.to_ascii_lowercase(),
				classes: classes.iter().map(ToString::to_string).collect(),
				attributes: BTreeMap::new(),
				parent: None,
				children: vec![],
			},
		);

		node
	}

	pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
		self.insert_before(parent, child, None)
	}

	/// Inserts `child` under `parent` right before `reference`, or last when `reference` is
	/// `None`. A child that already has a parent is moved.
	pub fn insert_before(
		&self,
		parent: NodeId,
		child: NodeId,
		reference: Option<NodeId>,
	) -> Result<(), HostError> {
		if reference == Some(child) {
			return Ok(());
		}

		let notifications = {
			let mut tree = self.tree.write();

			tree.element(parent)?;
			tree.element(child)?;

			if tree.is_inclusive_ancestor(child, parent) {
				return Err(HostError::HierarchyRequest { parent, child });
			}

			if let Some(reference) = reference {
				if tree.element(reference)?.parent != Some(parent) {
					return Err(HostError::NotAChild {
						parent,
						child: reference,
					});
				}
			}

			let mut records = Vec::with_capacity(2);
			records.extend(tree.detach(child)?);

			let siblings = &mut tree.element_mut(parent)?.children;
			let index = reference
				.and_then(|reference| siblings.iter().position(|sibling| *sibling == reference))
				.unwrap_or(siblings.len());
			siblings.insert(index, child);
			tree.element_mut(child)?.parent = Some(parent);

			records.push(MutationRecord {
				target: parent,
				added: vec![child],
				removed: vec![],
			});

			collect_notifications(&tree, records)
		};

		notify(notifications);

		Ok(())
	}

	pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
		let notifications = {
			let mut tree = self.tree.write();

			if tree.element(child)?.parent != Some(parent) {
				return Err(HostError::NotAChild { parent, child });
			}

			let records = tree.detach(child)?.into_iter().collect();
			collect_notifications(&tree, records)
		};

		notify(notifications);

		Ok(())
	}

	/// Swaps `old_child` for `new_child` in place, reported as a single record on `parent`.
	pub fn replace_child(
		&self,
		parent: NodeId,
		new_child: NodeId,
		old_child: NodeId,
	) -> Result<(), HostError> {
		if new_child == old_child {
			return Ok(());
		}

		let notifications = {
			let mut tree = self.tree.write();

			tree.element(new_child)?;
			if tree.element(old_child)?.parent != Some(parent) {
				return Err(HostError::NotAChild {
					parent,
					child: old_child,
				});
			}

			if tree.is_inclusive_ancestor(new_child, parent) {
				return Err(HostError::HierarchyRequest {
					parent,
					child: new_child,
				});
			}

			let mut records = Vec::with_capacity(2);
			if let Some(record) = tree.detach(new_child)? {
				records.push(record);
			}

			let siblings = &mut tree.element_mut(parent)?.children;
			let Some(index) = siblings.iter().position(|sibling| *sibling == old_child) else {
				return Err(HostError::NotAChild {
					parent,
					child: old_child,
				});
			};
			siblings[index] = new_child;

			tree.element_mut(old_child)?.parent = None;
			tree.element_mut(new_child)?.parent = Some(parent);

			records.push(MutationRecord {
				target: parent,
				added: vec![new_child],
				removed: vec![old_child],
			});

			collect_notifications(&tree, records)
		};

		notify(notifications);

		Ok(())
	}

	/// Whether `node` is still reachable from the document.
	#[must_use]
	pub fn is_attached(&self, node: NodeId) -> bool {
		let tree = self.tree.read();
		tree.elements.contains_key(&node) && tree.is_inclusive_ancestor(tree.document, node)
	}

	/// Every registered observer with the node it watches, in registration order.
	#[must_use]
	pub fn observers(&self) -> Vec<(ObserverId, NodeId)> {
		self.tree
			.read()
			.observers
			.iter()
			.map(|(id, observer)| (*id, observer.target))
			.collect()
	}

	#[must_use]
	pub fn observer_count(&self) -> usize {
		self.tree.read().observers.len()
	}

	#[must_use]
	pub fn is_observed(&self, node: NodeId) -> bool {
		self.tree
			.read()
			.observers
			.values()
			.any(|observer| observer.target == node)
	}

	#[must_use]
	pub fn classes(&self, node: NodeId) -> Vec<String> {
		self.tree
			.read()
			.elements
			.get(&node)
			.map(|element| element.classes.clone())
			.unwrap_or_default()
	}
}

impl Default for MemoryHost {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for MemoryHost {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tree = self.tree.read();
		f.debug_struct("MemoryHost")
			.field("document", &tree.document)
			.field("elements", &tree.elements.len())
			.field("observers", &tree.observers.len())
			.finish()
	}
}

fn collect_notifications(
	tree: &Tree,
	records: Vec<MutationRecord>,
) -> Vec<(MutationRecord, Vec<SharedCallback>)> {
	records
		.into_iter()
		.map(|record| {
			let callbacks = tree.callbacks_for(record.target);
			(record, callbacks)
		})
		.collect()
}

// Callbacks run with the tree unlocked, so they are free to read the host again.
fn notify(notifications: Vec<(MutationRecord, Vec<SharedCallback>)>) {
	for (record, callbacks) in notifications {
		trace!(
			target_node = %record.target,
			added = record.added.len(),
			removed = record.removed.len(),
			observers = callbacks.len(),
			"Child list mutated;"
		);

		for callback in callbacks {
			callback(&record);
		}
	}
}

impl ViewHost for MemoryHost {
	fn find_first_by_class(&self, class: &str) -> Option<NodeId> {
		let tree = self.tree.read();
		let document = tree.document;

		std::iter::once(document)
			.chain(tree.descendants(document))
			.find(|node| {
				tree.elements
					.get(node)
					.is_some_and(|element| element.classes.iter().any(|c| c == class))
			})
	}

	fn find_all_by_class(&self, within: NodeId, class: &str) -> Vec<NodeId> {
		let tree = self.tree.read();

		tree.descendants(within)
			.into_iter()
			.filter(|node| {
				tree.elements
					.get(node)
					.is_some_and(|element| element.classes.iter().any(|c| c == class))
			})
			.collect()
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.tree
			.read()
			.elements
			.get(&node)
			.and_then(|element| element.parent)
	}

	fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.tree
			.read()
			.elements
			.get(&node)
			.map(|element| element.children.clone())
			.unwrap_or_default()
	}

	fn tag(&self, node: NodeId) -> Option<String> {
		self.tree
			.read()
			.elements
			.get(&node)
			.map(|element| element.tag.clone())
	}

	fn has_class(&self, node: NodeId, class: &str) -> bool {
		self.tree
			.read()
			.elements
			.get(&node)
			.is_some_and(|element| element.classes.iter().any(|c| c == class))
	}

	fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		self.tree
			.read()
			.elements
			.get(&node)
			.and_then(|element| element.attributes.get(name).cloned())
	}

	fn add_class(&self, node: NodeId, class: &str) -> Result<bool, HostError> {
		let mut tree = self.tree.write();
		let classes = &mut tree.element_mut(node)?.classes;

		if classes.iter().any(|c| c == class) {
			return Ok(false);
		}

		classes.push(class.to_string());
		Ok(true)
	}

	fn remove_class(&self, node: NodeId, class: &str) -> Result<bool, HostError> {
		let mut tree = self.tree.write();
		let classes = &mut tree.element_mut(node)?.classes;
		let before = classes.len();

		classes.retain(|c| c != class);
		Ok(classes.len() != before)
	}

	fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
		self.tree
			.write()
			.element_mut(node)?
			.attributes
			.insert(name.to_string(), value.to_string());

		Ok(())
	}

	fn observe_child_list(
		&self,
		node: NodeId,
		callback: MutationCallback,
	) -> Result<ObserverId, HostError> {
		let mut tree = self.tree.write();
		tree.element(node)?;

		let observer = ObserverId::new(tree.allocate());
		tree.observers.insert(
			observer,
			Observer {
				target: node,
				callback: Arc::from(callback),
			},
		);

		Ok(observer)
	}

	fn disconnect(&self, observer: ObserverId) -> Result<(), HostError> {
		self.tree
			.write()
			.observers
			.remove(&observer)
			.map(|_| ())
			.ok_or(HostError::ObserverNotFound(observer))
	}
}
