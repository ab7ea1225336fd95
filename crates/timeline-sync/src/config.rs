use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Synchronizer configuration.
///
/// Every field has a default matching the chat client this was written against, so a partial
/// JSON document only needs to name what differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Cooldown shared by every coalescer
	pub cooldown_ms: u64,
	/// How many times an anchor lookup is tried before giving up
	pub poll_attempts: u32,
	/// Pause between two anchor lookups
	pub poll_interval_ms: u64,
	/// Class of the fixed root anchor, replaced on a context switch
	pub root_anchor_class: String,
	/// Class of the list node whose children are the entries
	pub list_anchor_class: String,
	pub entries: EntryFilter,
	pub stripes: StripeClasses,
	pub timestamps: TimestampConfig,
}

impl SyncConfig {
	pub fn from_json(json: &str) -> Result<Self, Error> {
		serde_json::from_str(json).map_err(Into::into)
	}

	#[must_use]
	pub const fn cooldown(&self) -> Duration {
		Duration::from_millis(self.cooldown_ms)
	}

	#[must_use]
	pub const fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			cooldown_ms: 500,
			poll_attempts: 20,
			poll_interval_ms: 500,
			root_anchor_class: "mx_MatrixChat".to_string(),
			list_anchor_class: "mx_RoomView_MessageList".to_string(),
			entries: EntryFilter::default(),
			stripes: StripeClasses::default(),
			timestamps: TimestampConfig::default(),
		}
	}
}

/// Which direct children of the list node count as entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
	/// Messages and date separators
	pub entry_tag: String,
	/// Entry-tagged nodes with this class are skipped (the read marker)
	pub skip_class: String,
	/// Collapsed event groups
	pub group_tag: String,
	/// Group-tagged nodes only count with this class, the rest are typing indicators and such
	pub group_class: String,
	pub token_attribute: String,
}

impl Default for EntryFilter {
	fn default() -> Self {
		Self {
			entry_tag: "li".to_string(),
			skip_class: "mx_RoomView_myReadMarker_container".to_string(),
			group_tag: "div".to_string(),
			group_class: "mx_EventListSummary".to_string(),
			token_attribute: "data-scroll-tokens".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeClasses {
	pub odd: String,
	pub even: String,
}

impl Default for StripeClasses {
	fn default() -> Self {
		Self {
			odd: "ext-line-odd".to_string(),
			even: "ext-line-even".to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
	pub class: String,
	/// Attribute holding the full date text
	pub source_attribute: String,
	/// Attribute receiving the `MM/DD ` prefix
	pub prefix_attribute: String,
}

impl Default for TimestampConfig {
	fn default() -> Self {
		Self {
			class: "mx_MessageTimestamp".to_string(),
			source_attribute: "title".to_string(),
			prefix_attribute: "ext-date".to_string(),
		}
	}
}
