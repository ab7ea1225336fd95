//!
//! # View Host
//!
//! The timeline synchronizer never owns the tree it decorates. This crate draws that line: the
//! [`ViewHost`] trait is everything the synchronizer may read, observe or touch, and
//! [`MemoryHost`] is a complete in-memory tree that behaves like a rendered document, including
//! discarded sub-trees that stay readable after the host drops them.
//!
//! ## Basic example
//!
//! ```
//! use std::sync::{
//! 	atomic::{AtomicUsize, Ordering},
//! 	Arc,
//! };
//!
//! use tl_view_host::{MemoryHost, ViewHost};
//!
//! let host = MemoryHost::new();
//! let list = host.create_element("ol", &["timeline"]);
//! host.append_child(host.document(), list).unwrap();
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! host.observe_child_list(list, Box::new({
//! 	let seen = Arc::clone(&seen);
//! 	move |record| {
//! 		seen.fetch_add(record.added.len(), Ordering::Relaxed);
//! 	}
//! }))
//! .unwrap();
//!
//! let item = host.create_element("li", &[]);
//! host.append_child(list, item).unwrap();
//!
//! assert_eq!(host.find_first_by_class("timeline"), Some(list));
//! assert_eq!(seen.load(Ordering::Relaxed), 1);
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

mod error;
mod host;
mod memory;

pub use error::HostError;
pub use host::{MutationCallback, MutationRecord, NodeId, ObserverId, ViewHost};
pub use memory::MemoryHost;
