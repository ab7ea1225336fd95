//! Folding bursts of run requests into one execution per cooldown window.
//!
//! ```text
//!     run()  run()  run()                   run()
//!       |      |      |                       |
//!       v      v      v                       v
//! ------+---------------+---------------+-----+------> t
//!       |   cooldown    |   cooldown    |     |
//!       |<------------->|<------------->|     |
//!       v               v                     v
//!     work            work                  work
//! ```
//!
//! The debouncer only keeps the bookkeeping. Whoever owns it decides what executing the work
//! means, and drives the deferred deadline with its own timer.

use std::time::Duration;

use tokio::time::Instant;

/// What a [`Debouncer::run`] request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
	/// The cooldown already elapsed, execute the work right now
	Immediate,
	/// A timer was armed, execute when [`Debouncer::fire`] says so at this instant
	Deferred(Instant),
	/// A timer is already pending and covers this request
	Absorbed,
}

#[derive(Debug)]
pub struct Debouncer<W> {
	work: W,
	cooldown: Duration,
	pending: Option<Instant>,
	last_run: Option<Instant>,
}

impl<W> Debouncer<W> {
	pub const fn new(work: W, cooldown: Duration) -> Self {
		Self {
			work,
			cooldown,
			pending: None,
			last_run: None,
		}
	}

	pub const fn work(&self) -> &W {
		&self.work
	}

	/// Instant at which the pending timer is due, if any.
	pub const fn deadline(&self) -> Option<Instant> {
		self.pending
	}

	pub fn run(&mut self, now: Instant) -> Schedule {
		if self.pending.is_some() {
			return Schedule::Absorbed;
		}

		match self.last_run {
			Some(last_run) if now < last_run + self.cooldown => {
				let deadline = last_run + self.cooldown;
				self.pending = Some(deadline);
				Schedule::Deferred(deadline)
			}
			_ => {
				self.last_run = Some(now);
				Schedule::Immediate
			}
		}
	}

	/// Clears a due timer and records the execution, returns whether the work must run now.
	pub fn fire(&mut self, now: Instant) -> bool {
		match self.pending {
			Some(deadline) if deadline <= now => {
				self.pending = None;
				self.last_run = Some(now);
				true
			}
			_ => false,
		}
	}
}
