#![allow(dead_code)]

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use tl_sync::{RecolorReport, Stripe, SyncEvent};
use tl_view_host::{HostError, MemoryHost, MutationCallback, NodeId, ObserverId, ViewHost};

use tokio::{sync::broadcast, time::timeout};

pub const TOKEN_ATTRIBUTE: &str = "data-scroll-tokens";
pub const FULL_DATE: &str = "Mon, Oct 19 2026 18:38:00";

/// A chat client page: `body > .mx_MatrixChat > .mx_RoomView > .mx_RoomView_body > ol`.
pub struct Page {
	pub host: Arc<MemoryHost>,
	pub root: NodeId,
}

pub struct Room {
	pub view: NodeId,
	pub body: NodeId,
	pub list: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recolored {
	pub list: NodeId,
	pub report: RecolorReport,
	pub annotated: usize,
}

impl Page {
	pub fn new() -> Self {
		let page = Self::unrendered();
		page.render_root();
		page
	}

	/// A page whose root anchor exists but is not attached to the document yet.
	pub fn unrendered() -> Self {
		let host = Arc::new(MemoryHost::new());
		let root = host.create_element("div", &["mx_MatrixChat"]);

		Self { host, root }
	}

	pub fn render_root(&self) {
		self.host
			.append_child(self.host.document(), self.root)
			.unwrap();
	}

	/// A detached room, ready to be swapped in.
	pub fn build_room(&self, tokens: &[&str]) -> Room {
		let view = self.host.create_element("div", &["mx_RoomView"]);
		let body = self.build_body(tokens);
		self.host.append_child(view, body).unwrap();

		Room {
			view,
			body,
			list: self.list_of(body),
		}
	}

	/// A detached room body, with a fresh list.
	pub fn build_body(&self, tokens: &[&str]) -> NodeId {
		let body = self.host.create_element("div", &["mx_RoomView_body"]);
		let list = self
			.host
			.create_element("ol", &["mx_RoomView_MessageList"]);

		for token in tokens {
			let line = self.line(token);
			self.host.append_child(list, line).unwrap();
		}

		self.host.append_child(body, list).unwrap();
		body
	}

	pub fn open_room(&self, tokens: &[&str]) -> Room {
		let room = self.build_room(tokens);
		self.host.append_child(self.root, room.view).unwrap();
		room
	}

	pub fn list_of(&self, body: NodeId) -> NodeId {
		self.host.children(body)[0]
	}

	/// A message line with a timestamp inside.
	pub fn line(&self, token: &str) -> NodeId {
		let line = self.host.create_element("li", &[]);
		self.host
			.set_attribute(line, TOKEN_ATTRIBUTE, token)
			.unwrap();

		let timestamp = self.host.create_element("span", &["mx_MessageTimestamp"]);
		self.host
			.set_attribute(timestamp, "title", FULL_DATE)
			.unwrap();
		self.host.append_child(line, timestamp).unwrap();

		line
	}

	pub fn append_line(&self, list: NodeId, token: &str) -> NodeId {
		let line = self.line(token);
		self.host.append_child(list, line).unwrap();
		line
	}

	pub fn prepend_line(&self, list: NodeId, token: &str) -> NodeId {
		let line = self.line(token);
		let first = self.host.children(list).first().copied();
		self.host.insert_before(list, line, first).unwrap();
		line
	}

	/// Stripes currently shown under `list`, keyed by token.
	pub fn stripes(&self, list: NodeId) -> Vec<(String, Stripe)> {
		self.host
			.children(list)
			.into_iter()
			.map(|line| {
				let token = self
					.host
					.attribute(line, TOKEN_ATTRIBUTE)
					.unwrap_or_default();
				let odd = self.host.has_class(line, "ext-line-odd");
				let even = self.host.has_class(line, "ext-line-even");
				assert!(odd ^ even, "line {token} must show exactly one stripe");

				(token, Stripe::from_odd(odd))
			})
			.collect()
	}
}

pub fn stripes_of(entries: &[(&str, Stripe)]) -> Vec<(String, Stripe)> {
	entries
		.iter()
		.map(|(token, stripe)| ((*token).to_string(), *stripe))
		.collect()
}

pub async fn recolored_within(
	events: &mut broadcast::Receiver<SyncEvent>,
	within: Duration,
) -> Option<Recolored> {
	timeout(within, async {
		loop {
			match events.recv().await {
				Ok(SyncEvent::Recolored {
					list,
					report,
					annotated,
				}) => {
					return Recolored {
						list,
						report,
						annotated,
					}
				}
				Ok(_) => {}
				Err(e) => panic!("synchronizer events closed: {e}"),
			}
		}
	})
	.await
	.ok()
}

pub async fn next_recolored(events: &mut broadcast::Receiver<SyncEvent>) -> Recolored {
	recolored_within(events, Duration::from_secs(60))
		.await
		.expect("no recoloring happened")
}

pub async fn next_event(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
	timeout(Duration::from_secs(60), events.recv())
		.await
		.expect("no synchronizer event")
		.expect("synchronizer events closed")
}

/// A [`MemoryHost`] whose class writes can be made to fail.
pub struct FlakyHost {
	inner: Arc<MemoryHost>,
	failing: AtomicBool,
}

impl FlakyHost {
	pub fn new(inner: Arc<MemoryHost>) -> Self {
		Self {
			inner,
			failing: AtomicBool::new(false),
		}
	}

	pub fn fail_class_writes(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}
}

impl ViewHost for FlakyHost {
	fn find_first_by_class(&self, class: &str) -> Option<NodeId> {
		self.inner.find_first_by_class(class)
	}

	fn find_all_by_class(&self, within: NodeId, class: &str) -> Vec<NodeId> {
		self.inner.find_all_by_class(within, class)
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.inner.parent(node)
	}

	fn children(&self, node: NodeId) -> Vec<NodeId> {
		self.inner.children(node)
	}

	fn tag(&self, node: NodeId) -> Option<String> {
		self.inner.tag(node)
	}

	fn has_class(&self, node: NodeId, class: &str) -> bool {
		self.inner.has_class(node, class)
	}

	fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		self.inner.attribute(node, name)
	}

	fn add_class(&self, node: NodeId, class: &str) -> Result<bool, HostError> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(HostError::NodeNotFound(node));
		}

		self.inner.add_class(node, class)
	}

	fn remove_class(&self, node: NodeId, class: &str) -> Result<bool, HostError> {
		self.inner.remove_class(node, class)
	}

	fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
		self.inner.set_attribute(node, name, value)
	}

	fn observe_child_list(
		&self,
		node: NodeId,
		callback: MutationCallback,
	) -> Result<ObserverId, HostError> {
		self.inner.observe_child_list(node, callback)
	}

	fn disconnect(&self, observer: ObserverId) -> Result<(), HostError> {
		self.inner.disconnect(observer)
	}
}
