use std::{mem, ops::ControlFlow, sync::Arc};

use tl_view_host::{NodeId, ViewHost};

use async_channel as chan;
use tokio::{
	spawn,
	sync::{broadcast, watch},
	task::JoinHandle,
	time::{sleep_until, Instant},
};
use tracing::{debug, error, info, instrument, trace, warn};

use super::{
	annotate::{annotate_timestamps, DatePrefixAnnotator, TimestampAnnotator},
	config::SyncConfig,
	debounce::{Debouncer, Schedule},
	entries::collect_entries,
	error::Error,
	partition::{PartitionStabilizer, RecolorReport},
	poller::ElementPoller,
	source::{ChangeSource, Insertion, NodeRole},
	subscription::SubscriptionTree,
};

const EVENTS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
	/// No list is observed, waiting for a root insertion or a reattach command
	Detached,
	/// Looking for anchors for the first time
	Attaching,
	/// Observing the list and its ancestors
	Attached,
	/// Dropping stale observation and attaching to a replaced tree
	Resyncing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
	Attached {
		list: NodeId,
		subscriptions: usize,
	},
	Detached,
	Recolored {
		list: NodeId,
		report: RecolorReport,
		annotated: usize,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
	/// First attach after spawning, never coalesced
	Attach,
	/// Entries were added to the live list
	NewEntries,
	/// The root anchor got a new sub-tree, a different context is shown
	ContextSwitch,
	/// Some ancestor of the list got replaced, same context
	Reconstruct,
}

/// Answer of a list lookup that had to wait for the host to render the anchor.
struct Verdict {
	insertion: Insertion,
	resolved: Option<NodeId>,
}

enum Message {
	Insertion(Insertion),
	Verdict(Verdict),
	Due,
	Reattach,
	Stop,
}

/// Keeps stripes and date annotations on the host's timeline up to date.
///
/// A single task owns every piece of mutable state. Host notifications, coalescer deadlines and
/// commands are handled one at a time, so no locking is needed anywhere. Lookups that have to
/// wait for the host run on their own tasks and report back, so the loop keeps firing deadlines
/// while they wait.
pub struct Synchronizer<H: ViewHost> {
	host: Arc<H>,
	config: SyncConfig,
	subscriptions: SubscriptionTree<H>,
	stabilizer: PartitionStabilizer,
	annotator: Arc<dyn TimestampAnnotator>,
	new_entries: Debouncer<Job>,
	context_switch: Debouncer<Job>,
	reconstruct: Debouncer<Job>,
	insertions_rx: chan::Receiver<Insertion>,
	verdicts_tx: chan::Sender<Verdict>,
	verdicts_rx: chan::Receiver<Verdict>,
	lookups: Vec<JoinHandle<()>>,
	reattach_rx: chan::Receiver<()>,
	stop_rx: chan::Receiver<()>,
	state_tx: watch::Sender<SyncState>,
	events_tx: broadcast::Sender<SyncEvent>,
}

impl<H: ViewHost> Synchronizer<H> {
	/// Spawns the synchronizer on the current tokio runtime.
	///
	/// The returned receiver sees every event from the very first attach on.
	pub fn spawn(
		host: Arc<H>,
		config: SyncConfig,
	) -> (SynchronizerHandle, broadcast::Receiver<SyncEvent>) {
		Self::spawn_with_annotator(host, config, Arc::new(DatePrefixAnnotator))
	}

	pub fn spawn_with_annotator(
		host: Arc<H>,
		config: SyncConfig,
		annotator: Arc<dyn TimestampAnnotator>,
	) -> (SynchronizerHandle, broadcast::Receiver<SyncEvent>) {
		let (source, insertions_rx) = ChangeSource::new(Arc::clone(&host));
		let poller = ElementPoller::from_config(Arc::clone(&host), &config);
		let subscriptions = SubscriptionTree::new(
			source,
			poller,
			config.root_anchor_class.clone(),
			config.list_anchor_class.clone(),
		);

		let (verdicts_tx, verdicts_rx) = chan::unbounded();
		let (reattach_tx, reattach_rx) = chan::bounded(8);
		let (stop_tx, stop_rx) = chan::bounded(1);
		let (state_tx, state_rx) = watch::channel(SyncState::Detached);
		let (events_tx, events_rx) = broadcast::channel(EVENTS_CAPACITY);

		let cooldown = config.cooldown();

		let synchronizer = Self {
			host,
			stabilizer: PartitionStabilizer::new(config.stripes.clone()),
			config,
			subscriptions,
			annotator,
			new_entries: Debouncer::new(Job::NewEntries, cooldown),
			context_switch: Debouncer::new(Job::ContextSwitch, cooldown),
			reconstruct: Debouncer::new(Job::Reconstruct, cooldown),
			insertions_rx,
			verdicts_tx,
			verdicts_rx,
			lookups: Vec::new(),
			reattach_rx,
			stop_rx,
			state_tx,
			events_tx: events_tx.clone(),
		};

		let handle = SynchronizerHandle {
			reattach_tx,
			stop_tx,
			state_rx,
			events_tx,
			handle: Some(spawn(synchronizer.run())),
		};

		(handle, events_rx)
	}

	#[instrument(name = "timeline_synchronizer", skip_all)]
	async fn run(mut self) {
		let mut jobs = vec![Job::Attach];

		loop {
			for job in mem::take(&mut jobs) {
				if self.execute(job).await.is_break() {
					return self.shutdown();
				}
			}

			let deadline = self.next_deadline();

			let msg = tokio::select! {
				biased;

				_ = self.stop_rx.recv() => Message::Stop,

				reattach = self.reattach_rx.recv() => {
					reattach.map_or(Message::Stop, |()| Message::Reattach)
				}

				Ok(verdict) = self.verdicts_rx.recv() => Message::Verdict(verdict),

				Ok(insertion) = self.insertions_rx.recv() => Message::Insertion(insertion),

				() = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
					Message::Due
				}

				else => Message::Stop,
			};

			jobs = match msg {
				Message::Insertion(insertion) => self.observe(insertion).into_iter().collect(),
				Message::Verdict(Verdict {
					insertion,
					resolved,
				}) => self.schedule(insertion, resolved).into_iter().collect(),
				Message::Due => self.due_jobs(),
				Message::Reattach => vec![Job::Reconstruct],
				Message::Stop => break,
			};
		}

		self.shutdown();
	}

	fn shutdown(&mut self) {
		for lookup in self.lookups.drain(..) {
			lookup.abort();
		}

		self.subscriptions.teardown();
		self.set_state(SyncState::Detached);

		info!("Timeline synchronizer stopped");
	}

	fn next_deadline(&self) -> Option<Instant> {
		[&self.new_entries, &self.context_switch, &self.reconstruct]
			.into_iter()
			.filter_map(Debouncer::deadline)
			.min()
	}

	fn debouncer_mut(&mut self, job: Job) -> Option<&mut Debouncer<Job>> {
		match job {
			Job::Attach => None,
			Job::NewEntries => Some(&mut self.new_entries),
			Job::ContextSwitch => Some(&mut self.context_switch),
			Job::Reconstruct => Some(&mut self.reconstruct),
		}
	}

	/// Resolves the list right away when the host already renders it. Otherwise the bounded
	/// lookup runs on its own task and its verdict comes back as a message.
	fn observe(&mut self, insertion: Insertion) -> Option<Job> {
		if let Some(resolved) = self.subscriptions.locate_list() {
			return self.schedule(insertion, Some(resolved));
		}

		trace!(node = %insertion.node, role = ?insertion.role, "List anchor missing, looking it up in the background;");

		let list_lookup = self.subscriptions.list_lookup();
		let verdicts_tx = self.verdicts_tx.clone();

		self.lookups.retain(|lookup| !lookup.is_finished());
		self.lookups.push(spawn(async move {
			let resolved = list_lookup.await;

			if verdicts_tx
				.send(Verdict {
					insertion,
					resolved,
				})
				.await
				.is_err()
			{
				trace!("Synchronizer gone, dropping liveness verdict;");
			}
		}));

		None
	}

	/// Handlers never touch state themselves, they only ask a coalescer to run.
	fn schedule(&mut self, insertion: Insertion, resolved: Option<NodeId>) -> Option<Job> {
		let job = if self.subscriptions.is_current(resolved) {
			Job::NewEntries
		} else if insertion.role == NodeRole::Root {
			Job::ContextSwitch
		} else {
			Job::Reconstruct
		};

		trace!(node = %insertion.node, role = ?insertion.role, added = insertion.added, ?job, "Insertion observed;");

		let debouncer = self.debouncer_mut(job)?;

		match debouncer.run(Instant::now()) {
			Schedule::Immediate => Some(job),
			Schedule::Deferred(deadline) => {
				trace!(?job, ?deadline, "Job deferred;");
				None
			}
			Schedule::Absorbed => {
				trace!(?job, "Job already pending;");
				None
			}
		}
	}

	fn due_jobs(&mut self) -> Vec<Job> {
		let now = Instant::now();

		[
			&mut self.context_switch,
			&mut self.reconstruct,
			&mut self.new_entries,
		]
		.into_iter()
		.filter_map(|debouncer| debouncer.fire(now).then(|| *debouncer.work()))
		.collect()
	}

	/// Runs `job` unless a stop request comes in first.
	async fn execute(&mut self, job: Job) -> ControlFlow<()> {
		let stop_rx = self.stop_rx.clone();

		tokio::select! {
			biased;

			_ = stop_rx.recv() => {
				debug!(?job, "Stop requested, abandoning job;");
				ControlFlow::Break(())
			}

			res = self.perform(job) => {
				if let Err(e) = res {
					error!(?e, ?job, "Timeline job failed;");
				}
				ControlFlow::Continue(())
			}
		}
	}

	async fn perform(&mut self, job: Job) -> Result<(), Error> {
		match job {
			Job::Attach => self.resync(true).await,

			Job::NewEntries => {
				let Some(list) = self.subscriptions.tracked() else {
					trace!("No list attached, nothing to recolor;");
					return Ok(());
				};

				self.recompute(list, false)
			}

			Job::ContextSwitch => {
				debug!("Context switched, restarting stripes;");
				self.stabilizer.reset();
				self.resync(true).await
			}

			Job::Reconstruct => {
				debug!("Timeline reconstructed, reattaching;");
				self.resync(false).await
			}
		}
	}

	#[instrument(skip(self))]
	async fn resync(&mut self, is_initial: bool) -> Result<(), Error> {
		let next = if *self.state_tx.borrow() == SyncState::Attached {
			SyncState::Resyncing
		} else {
			SyncState::Attaching
		};
		self.set_state(next);

		match self.subscriptions.resubscribe().await {
			Ok(Some(list)) => {
				self.set_state(SyncState::Attached);
				self.emit(SyncEvent::Attached {
					list,
					subscriptions: self.subscriptions.subscriptions().len(),
				});

				self.recompute(list, is_initial)
			}

			Ok(None) => {
				warn!("Timeline anchors not found, detached until the host renders them;");
				self.detach();
				Ok(())
			}

			Err(e) => {
				self.detach();
				Err(e)
			}
		}
	}

	fn detach(&mut self) {
		self.set_state(SyncState::Detached);
		self.emit(SyncEvent::Detached);
	}

	fn recompute(&mut self, list: NodeId, is_initial: bool) -> Result<(), Error> {
		let annotated = annotate_timestamps(
			&*self.host,
			list,
			&self.config.timestamps,
			&*self.annotator,
		)?;

		let entries = collect_entries(&*self.host, list, &self.config.entries);
		let report = self
			.stabilizer
			.recolor(&*self.host, &entries, is_initial)?;

		self.emit(SyncEvent::Recolored {
			list,
			report,
			annotated,
		});

		Ok(())
	}

	fn set_state(&self, state: SyncState) {
		let previous = self.state_tx.send_replace(state);
		if previous != state {
			debug!(?previous, ?state, "Synchronizer state changed;");
		}
	}

	fn emit(&self, event: SyncEvent) {
		if self.events_tx.send(event).is_err() {
			trace!("No one is listening to synchronizer events;");
		}
	}
}

/// Control side of a spawned [`Synchronizer`].
///
/// Dropping the handle stops the synchronizer as well.
pub struct SynchronizerHandle {
	reattach_tx: chan::Sender<()>,
	stop_tx: chan::Sender<()>,
	state_rx: watch::Receiver<SyncState>,
	events_tx: broadcast::Sender<SyncEvent>,
	handle: Option<JoinHandle<()>>,
}

impl SynchronizerHandle {
	#[must_use]
	pub fn state(&self) -> SyncState {
		*self.state_rx.borrow()
	}

	/// Events emitted from now on. The receiver returned by `spawn` has every event since then.
	#[must_use]
	pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
		self.events_tx.subscribe()
	}

	pub async fn wait_for_state(&mut self, state: SyncState) -> Result<(), Error> {
		self.state_rx
			.wait_for(|current| *current == state)
			.await
			.map(|_| ())
			.map_err(|_| Error::Stopped)
	}

	/// Drops current observation and attaches again, without waiting for a host insertion.
	pub async fn reattach(&self) -> Result<(), Error> {
		self.reattach_tx
			.send(())
			.await
			.map_err(|_| Error::Stopped)
	}

	/// Stops the synchronizer and waits until every subscription is gone.
	///
	/// A job still waiting on the host is abandoned.
	pub async fn stop(mut self) {
		if self.stop_tx.send(()).await.is_err() {
			debug!("Timeline synchronizer already stopped;");
		}

		if let Some(handle) = self.handle.take() {
			if let Err(e) = handle.await {
				error!(?e, "Timeline synchronizer task failed;");
			}
		}
	}
}
