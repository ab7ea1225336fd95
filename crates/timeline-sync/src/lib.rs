//!
//! # Timeline Sync
//!
//! Decorates a timeline rendered by a host application it does not control. Every visible entry
//! gets an alternating stripe class and every timestamp gets a short date prefix, and both stay
//! correct while the host inserts entries, scrolls, and throws whole sub-trees away to render
//! them again.
//!
//! The pieces, leaves first:
//! - [`ElementPoller`] waits, with a bounded budget, for anchors the host renders late;
//! - [`ChangeSource`] turns child insertions on observed nodes into [`Insertion`]s;
//! - [`Debouncer`] folds bursts of requests into one run per cooldown window;
//! - [`SubscriptionTree`] observes the list and each of its ancestors up to the root anchor, and
//!   tells a replaced list from a live one by identity;
//! - [`PartitionStabilizer`] assigns stripes without inverting lines already on screen;
//! - [`Synchronizer`] ties all of it together in a single task.
//!
//! ## Basic example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tl_sync::{SyncConfig, SyncEvent, Synchronizer};
//! use tl_view_host::{MemoryHost, ViewHost};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let host = Arc::new(MemoryHost::new());
//!     let root = host.create_element("div", &["mx_MatrixChat"]);
//!     let list = host.create_element("ol", &["mx_RoomView_MessageList"]);
//!     host.append_child(host.document(), root).unwrap();
//!     host.append_child(root, list).unwrap();
//!
//!     let line = host.create_element("li", &[]);
//!     host.set_attribute(line, "data-scroll-tokens", "$event").unwrap();
//!     host.append_child(list, line).unwrap();
//!
//!     let (handle, mut events) = Synchronizer::spawn(Arc::clone(&host), SyncConfig::default());
//!
//!     while !matches!(events.recv().await, Ok(SyncEvent::Recolored { .. })) {}
//!
//!     assert!(host.has_class(line, "ext-line-even"));
//!
//!     handle.stop().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod annotate;
mod config;
mod debounce;
mod entries;
mod error;
mod partition;
mod poller;
mod source;
mod subscription;
mod synchronizer;

pub use annotate::{annotate_timestamps, DatePrefixAnnotator, TimestampAnnotator};
pub use config::{EntryFilter, StripeClasses, SyncConfig, TimestampConfig};
pub use debounce::{Debouncer, Schedule};
pub use entries::{collect_entries, Entry, EntryKind};
pub use error::Error;
pub use partition::{Anchor, PartitionStabilizer, RecolorReport, StabilityMemo, Stripe};
pub use poller::ElementPoller;
pub use source::{ChangeSource, Insertion, NodeRole};
pub use subscription::{Subscription, SubscriptionSet, SubscriptionTree};
pub use synchronizer::{SyncEvent, SyncState, Synchronizer, SynchronizerHandle};
