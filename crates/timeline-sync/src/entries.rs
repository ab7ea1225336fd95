use tl_view_host::{NodeId, ViewHost};

use super::config::EntryFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	/// A message or a date separator
	Message,
	/// A collapsed group of events, colored as a single line
	GroupSummary,
}

/// One colorable line of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
	pub node: NodeId,
	pub kind: EntryKind,
	/// Host supplied identity, absent on date separators
	pub token: Option<String>,
}

impl Entry {
	/// Whether this entry can be recognized again across recomputations.
	pub const fn is_addressable(&self) -> bool {
		self.token.is_some()
	}
}

/// Builds the ordered entry sequence from the current children of `list`.
pub fn collect_entries<H: ViewHost + ?Sized>(
	host: &H,
	list: NodeId,
	filter: &EntryFilter,
) -> Vec<Entry> {
	host.children(list)
		.into_iter()
		.filter_map(|node| {
			let tag = host.tag(node)?;

			let kind = if tag == filter.entry_tag {
				if host.has_class(node, &filter.skip_class) {
					return None;
				}
				EntryKind::Message
			} else if tag == filter.group_tag {
				if !host.has_class(node, &filter.group_class) {
					return None;
				}
				EntryKind::GroupSummary
			} else {
				return None;
			};

			let token = host
				.attribute(node, &filter.token_attribute)
				.filter(|token| !token.is_empty());

			Some(Entry { node, kind, token })
		})
		.collect()
}
