use std::collections::HashMap;

use tl_view_host::{HostError, NodeId, ViewHost};

use tracing::{debug, error, trace};

use super::{config::StripeClasses, entries::Entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stripe {
	Odd,
	Even,
}

impl Stripe {
	pub const fn from_odd(odd: bool) -> Self {
		if odd {
			Self::Odd
		} else {
			Self::Even
		}
	}

	pub const fn is_odd(self) -> bool {
		matches!(self, Self::Odd)
	}

	/// Stripe of the entry at `index` when the first entry's stripe is odd iff `first_is_odd`.
	pub const fn at(first_is_odd: bool, index: usize) -> Self {
		Self::from_odd(first_is_odd ^ (index % 2 == 1))
	}
}

/// What decided the stripe of the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
	/// Restarted from scratch after an attach or a context switch
	Initial,
	/// First entry with a remembered token
	Memo { token: String, index: usize },
	/// Nothing remembered matched, first entry already showing a stripe
	Visible { index: usize },
	/// Nothing to go by
	Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecolorReport {
	pub first_is_odd: bool,
	pub anchor: Anchor,
	pub stripes: Vec<Stripe>,
	/// Entries that were showing the opposite stripe before this recoloring
	pub flipped: usize,
}

/// Last stripe made visible for boundary tokens, keyed by token.
#[derive(Debug, Clone, Default)]
pub struct StabilityMemo {
	odd_by_token: HashMap<String, bool>,
}

impl StabilityMemo {
	pub fn get(&self, token: &str) -> Option<bool> {
		self.odd_by_token.get(token).copied()
	}

	pub fn record(&mut self, token: &str, odd: bool) {
		self.odd_by_token.insert(token.to_string(), odd);
	}

	pub fn clear(&mut self) {
		self.odd_by_token.clear();
	}

	pub fn len(&self) -> usize {
		self.odd_by_token.len()
	}

	pub fn is_empty(&self) -> bool {
		self.odd_by_token.is_empty()
	}
}

/// Alternating two-coloring that does not invert lines a reader is already looking at.
///
/// Only the first and last addressable entries of every recoloring are remembered. That is
/// enough to keep colors in place when entries are added or dropped at either end.
#[derive(Debug)]
pub struct PartitionStabilizer {
	memo: StabilityMemo,
	classes: StripeClasses,
}

impl PartitionStabilizer {
	pub fn new(classes: StripeClasses) -> Self {
		Self {
			memo: StabilityMemo::default(),
			classes,
		}
	}

	pub const fn memo(&self) -> &StabilityMemo {
		&self.memo
	}

	/// Forgets every remembered stripe, used on a context switch.
	pub fn reset(&mut self) {
		self.memo.clear();
	}

	pub fn recolor<H: ViewHost + ?Sized>(
		&mut self,
		host: &H,
		entries: &[Entry],
		is_initial: bool,
	) -> Result<RecolorReport, HostError> {
		let (first_is_odd, anchor) = if is_initial {
			(false, Anchor::Initial)
		} else {
			self.first_is_odd(host, entries)
		};

		let stripes = (0..entries.len())
			.map(|index| Stripe::at(first_is_odd, index))
			.collect::<Vec<_>>();

		let flipped = self.apply(host, entries, &stripes)?;
		self.note_boundaries(entries, &stripes);

		trace!(
			entries = entries.len(),
			first_is_odd,
			?anchor,
			flipped,
			"Recolored timeline;"
		);

		Ok(RecolorReport {
			first_is_odd,
			anchor,
			stripes,
			flipped,
		})
	}

	fn first_is_odd<H: ViewHost + ?Sized>(&self, host: &H, entries: &[Entry]) -> (bool, Anchor) {
		let remembered = entries.iter().enumerate().find_map(|(index, entry)| {
			let token = entry.token.as_deref()?;
			self.memo.get(token).map(|odd| (index, token, odd))
		});

		if let Some((index, token, odd)) = remembered {
			return (
				odd ^ (index % 2 == 1),
				Anchor::Memo {
					token: token.to_string(),
					index,
				},
			);
		}

		// Both boundaries are gone, fall back to whatever is on screen right now.
		let visible = entries.iter().enumerate().find_map(|(index, entry)| {
			self.visible_stripe(host, entry.node)
				.map(|stripe| (index, stripe))
		});

		if let Some((index, stripe)) = visible {
			return (stripe.is_odd() ^ (index % 2 == 1), Anchor::Visible { index });
		}

		(false, Anchor::Default)
	}

	fn visible_stripe<H: ViewHost + ?Sized>(&self, host: &H, node: NodeId) -> Option<Stripe> {
		match (
			host.has_class(node, &self.classes.odd),
			host.has_class(node, &self.classes.even),
		) {
			(true, false) => Some(Stripe::Odd),
			(false, true) => Some(Stripe::Even),
			_ => None,
		}
	}

	fn apply<H: ViewHost + ?Sized>(
		&self,
		host: &H,
		entries: &[Entry],
		stripes: &[Stripe],
	) -> Result<usize, HostError> {
		let mut flipped = 0;

		for (entry, stripe) in entries.iter().zip(stripes) {
			let (wanted, opposite) = if stripe.is_odd() {
				(&self.classes.odd, &self.classes.even)
			} else {
				(&self.classes.even, &self.classes.odd)
			};

			if host.remove_class(entry.node, opposite)? {
				flipped += 1;

				match entry
					.token
					.as_deref()
					.filter(|token| self.memo.get(token).is_some())
				{
					Some(token) => {
						error!(%token, node = %entry.node, "Stripe flipped on a remembered entry;");
					}
					None => debug!(node = %entry.node, "Stripe flipped;"),
				}
			}

			host.add_class(entry.node, wanted)?;
		}

		Ok(flipped)
	}

	fn note_boundaries(&mut self, entries: &[Entry], stripes: &[Stripe]) {
		let first = entries.iter().position(Entry::is_addressable);
		let last = entries.iter().rposition(Entry::is_addressable);

		for index in first.into_iter().chain(last) {
			if let Some(token) = &entries[index].token {
				self.memo.record(token, stripes[index].is_odd());
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use tl_view_host::MemoryHost;

	use super::{super::entries::EntryKind, *};

	use super::Stripe::{Even, Odd};

	fn entry(host: &MemoryHost, token: Option<&str>) -> Entry {
		Entry {
			node: host.create_element("li", &[]),
			kind: EntryKind::Message,
			token: token.map(ToString::to_string),
		}
	}

	fn stabilizer() -> PartitionStabilizer {
		PartitionStabilizer::new(StripeClasses::default())
	}

	fn shown(host: &MemoryHost, entries: &[Entry]) -> Vec<Stripe> {
		entries
			.iter()
			.map(|entry| {
				let odd = host.has_class(entry.node, "ext-line-odd");
				let even = host.has_class(entry.node, "ext-line-even");
				assert!(odd ^ even, "exactly one stripe class on {}", entry.node);
				Stripe::from_odd(odd)
			})
			.collect()
	}

	#[test]
	fn initial_recolor_starts_even_and_remembers_boundaries() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let entries = ["a", "b", "c"].map(|token| entry(&host, Some(token)));

		let report = stabilizer.recolor(&host, &entries, true).unwrap();

		assert_eq!(report.anchor, Anchor::Initial);
		assert!(!report.first_is_odd);
		assert_eq!(report.stripes, vec![Even, Odd, Even]);
		assert_eq!(shown(&host, &entries), report.stripes);
		assert_eq!(stabilizer.memo().len(), 2);
		assert_eq!(stabilizer.memo().get("a"), Some(false));
		assert_eq!(stabilizer.memo().get("b"), None);
		assert_eq!(stabilizer.memo().get("c"), Some(false));
	}

	#[test]
	fn appending_keeps_shared_stripes() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let mut entries = ["a", "b", "c"]
			.map(|token| entry(&host, Some(token)))
			.to_vec();
		stabilizer.recolor(&host, &entries, true).unwrap();

		entries.push(entry(&host, Some("d")));
		let report = stabilizer.recolor(&host, &entries, false).unwrap();

		assert_eq!(report.anchor, Anchor::Memo {
			token: "a".to_string(),
			index: 0
		});
		assert_eq!(report.stripes, vec![Even, Odd, Even, Odd]);
		assert_eq!(report.flipped, 0);
		assert_eq!(stabilizer.memo().get("a"), Some(false));
		assert_eq!(stabilizer.memo().get("c"), Some(false));
		assert_eq!(stabilizer.memo().get("d"), Some(true));
	}

	#[test]
	fn prepending_shifts_the_first_stripe() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let mut entries = ["a", "b", "c"]
			.map(|token| entry(&host, Some(token)))
			.to_vec();
		stabilizer.recolor(&host, &entries, true).unwrap();

		entries.insert(0, entry(&host, Some("z")));
		let report = stabilizer.recolor(&host, &entries, false).unwrap();

		assert!(report.first_is_odd);
		assert_eq!(report.stripes, vec![Odd, Even, Odd, Even]);
		assert_eq!(shown(&host, &entries[1..]), vec![Even, Odd, Even]);
		assert_eq!(report.flipped, 0);
	}

	#[test]
	fn truncating_the_front_uses_the_last_boundary() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let entries = ["a", "b", "c", "d"].map(|token| entry(&host, Some(token)));
		stabilizer.recolor(&host, &entries, true).unwrap();

		let report = stabilizer.recolor(&host, &entries[1..], false).unwrap();

		assert_eq!(report.anchor, Anchor::Memo {
			token: "d".to_string(),
			index: 2
		});
		assert_eq!(report.stripes, vec![Odd, Even, Odd]);
		assert_eq!(report.flipped, 0);
	}

	#[test]
	fn initial_recolor_ignores_the_memo() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let shifted = [entry(&host, Some("z")), entry(&host, Some("a"))];
		stabilizer.recolor(&host, &shifted, true).unwrap();
		assert_eq!(stabilizer.memo().get("a"), Some(true));

		let entries = [entry(&host, Some("a")), entry(&host, Some("b"))];
		let report = stabilizer.recolor(&host, &entries, true).unwrap();

		assert!(!report.first_is_odd);
		assert_eq!(report.stripes, vec![Even, Odd]);
	}

	#[test]
	fn lost_boundaries_fall_back_to_visible_stripes() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let entries = ["a", "b", "c", "d", "e"].map(|token| entry(&host, Some(token)));
		stabilizer.recolor(&host, &entries, true).unwrap();

		// Neither "a" nor "e" survives, only the interior is left on screen.
		let report = stabilizer.recolor(&host, &entries[1..4], false).unwrap();

		assert_eq!(report.anchor, Anchor::Visible { index: 0 });
		assert_eq!(report.stripes, vec![Odd, Even, Odd]);
		assert_eq!(report.flipped, 0);
	}

	#[test]
	fn brand_new_window_defaults_to_even() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		stabilizer
			.recolor(&host, &[entry(&host, Some("a"))], true)
			.unwrap();

		let entries = ["x", "y"].map(|token| entry(&host, Some(token)));
		let report = stabilizer.recolor(&host, &entries, false).unwrap();

		assert_eq!(report.anchor, Anchor::Default);
		assert_eq!(report.stripes, vec![Even, Odd]);
	}

	#[test]
	fn tokenless_entries_are_colored_but_never_remembered() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let entries = [
			entry(&host, None),
			entry(&host, Some("a")),
			entry(&host, None),
			entry(&host, Some("b")),
			entry(&host, None),
		];

		let report = stabilizer.recolor(&host, &entries, true).unwrap();

		assert_eq!(report.stripes, vec![Even, Odd, Even, Odd, Even]);
		assert_eq!(stabilizer.memo().len(), 2);
		assert_eq!(stabilizer.memo().get("a"), Some(true));
		assert_eq!(stabilizer.memo().get("b"), Some(true));
	}

	#[test]
	fn adjacent_entries_always_differ() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let pool = (0..12)
			.map(|i| entry(&host, (i % 4 != 0).then(|| format!("t{i}")).as_deref()))
			.collect::<Vec<_>>();

		for (start, end, is_initial) in [
			(0, 12, true),
			(2, 9, false),
			(5, 12, false),
			(0, 3, false),
			(1, 1, false),
			(3, 11, true),
		] {
			let window = &pool[start..end];
			let report = stabilizer.recolor(&host, window, is_initial).unwrap();

			assert_eq!(report.stripes.len(), window.len());
			assert!(report.stripes.windows(2).all(|pair| pair[0] != pair[1]));
			assert_eq!(shown(&host, window), report.stripes);
		}
	}

	#[test]
	fn reset_forgets_everything() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		stabilizer
			.recolor(&host, &[entry(&host, Some("a")), entry(&host, Some("b"))], true)
			.unwrap();

		stabilizer.reset();

		assert!(stabilizer.memo().is_empty());
	}

	#[test]
	#[tracing_test::traced_test]
	fn restart_flips_are_counted() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let entries = ["a", "b"].map(|token| entry(&host, Some(token)));
		host.add_class(entries[0].node, "ext-line-odd").unwrap();
		host.add_class(entries[1].node, "ext-line-even").unwrap();

		let report = stabilizer.recolor(&host, &entries, true).unwrap();

		assert_eq!(report.flipped, 2);
		assert_eq!(shown(&host, &entries), vec![Even, Odd]);
		assert!(logs_contain("Stripe flipped"));
		assert!(!logs_contain("Stripe flipped on a remembered entry"));
	}

	#[test]
	#[tracing_test::traced_test]
	fn interior_insertion_flips_a_remembered_boundary() {
		let host = MemoryHost::new();
		let mut stabilizer = stabilizer();
		let [a, b, c] = ["a", "b", "c"].map(|token| entry(&host, Some(token)));
		stabilizer
			.recolor(&host, &[a.clone(), b.clone(), c.clone()], true)
			.unwrap();

		// Only the boundaries are remembered, so a line squeezed in the middle shifts the rest
		let entries = [a, entry(&host, Some("x")), b, c];
		let report = stabilizer.recolor(&host, &entries, false).unwrap();

		assert_eq!(report.anchor, Anchor::Memo {
			token: "a".to_string(),
			index: 0
		});
		assert_eq!(report.stripes, vec![Even, Odd, Even, Odd]);
		assert_eq!(report.flipped, 2);
		assert_eq!(shown(&host, &entries), report.stripes);
		assert!(logs_contain("Stripe flipped on a remembered entry"));
	}
}
