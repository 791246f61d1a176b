//! Background reload scheduling.
//!
//! A single supervisor task owns the bookkeeping for every watched
//! configuration. Callers talk to it over a command channel; each active
//! configuration gets its own poll task that checks the resource on an
//! interval, re-loads it when it changed and sends the result back to the
//! supervisor over a separate swap channel. Only the supervisor swaps
//! configurations into handles.
//!
//! ```text
//!   caller ──Command──▶ supervisor ◀──Swap── poll task (one per Active entry)
//!                           │
//!                           ▼
//!                    ConfigHandle::set_configuration
//! ```
//!
//! Reads run on the blocking pool. Each read of an entry is numbered, and a
//! result is only installed if it is newer than the last one installed. A
//! result that arrives while its entry is suspended is kept and installed on
//! resume, since the read already consumed the resource's change marker.
//! Reload failures are logged and the current configuration stays in place.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::configuration::Configuration;
use crate::error::{ProptreeError, Result};
use crate::handle::{ConfigHandle, HandleId};
use crate::loader::Loader;
use crate::resource::Resource;
use crate::types::ReloadPolicy;

/// Where a watched configuration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Polled for changes.
    Active,
    /// Polling cancelled until resumed.
    Suspended,
    /// No reload policy, never polled.
    Static,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReloadState::Active => "active",
            ReloadState::Suspended => "suspended",
            ReloadState::Static => "static",
        };
        f.write_str(label)
    }
}

enum Command {
    Watch {
        handle: ConfigHandle,
        resource: Arc<dyn Resource>,
    },
    Unwatch(HandleId),
    /// `None` targets every entry.
    Suspend {
        id: Option<HandleId>,
        reply: oneshot::Sender<usize>,
    },
    Resume {
        id: Option<HandleId>,
        reply: oneshot::Sender<usize>,
    },
    State {
        id: HandleId,
        reply: oneshot::Sender<Option<ReloadState>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

static NEXT_WATCH: AtomicU64 = AtomicU64::new(1);

/// A freshly loaded configuration produced by a poll task.
struct Swap {
    id: HandleId,
    watch: u64,
    sequence: u64,
    configuration: Configuration,
}

/// A reload read while its entry was suspended.
struct Pending {
    sequence: u64,
    configuration: Configuration,
}

/// Handle to the reload supervisor.
pub struct ReloadService {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReloadService {
    /// Spawn the supervisor on the current Tokio runtime. Reload intervals
    /// shorter than `min_check_every` are raised to it.
    pub fn start(loader: Arc<Loader>, min_check_every: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ProptreeError::NoRuntime)?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (swap_tx, swap_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let supervisor = Supervisor {
            loader,
            min_check_every,
            entries: HashMap::new(),
            swaps: swap_tx,
            shutdown: shutdown.clone(),
        };
        let task = runtime.spawn(supervisor.run(command_rx, swap_rx));
        debug!(?min_check_every, "reload service started");

        Ok(Self {
            commands,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Start managing `handle`, re-loading it from `resource`. Scheduled
    /// only if its configuration has an `on_change` reload policy.
    pub fn watch(&self, handle: ConfigHandle, resource: Arc<dyn Resource>) -> Result<()> {
        self.send(Command::Watch { handle, resource })
    }

    /// Stop managing `id`; its poll task is cancelled.
    pub fn unwatch(&self, id: HandleId) -> Result<()> {
        self.send(Command::Unwatch(id))
    }

    /// Cancel the poll task of `id`. Returns `false` if it was not active.
    pub async fn suspend(&self, id: HandleId) -> Result<bool> {
        let count = self
            .request(|reply| Command::Suspend { id: Some(id), reply })
            .await?;
        Ok(count > 0)
    }

    /// Reschedule a suspended `id` from scratch. Returns `false` if it was
    /// not suspended.
    pub async fn resume(&self, id: HandleId) -> Result<bool> {
        let count = self
            .request(|reply| Command::Resume { id: Some(id), reply })
            .await?;
        Ok(count > 0)
    }

    /// Suspend every active entry. Returns how many were suspended.
    pub async fn suspend_all(&self) -> Result<usize> {
        self.request(|reply| Command::Suspend { id: None, reply }).await
    }

    /// Resume every suspended entry. Returns how many were resumed.
    pub async fn resume_all(&self) -> Result<usize> {
        self.request(|reply| Command::Resume { id: None, reply }).await
    }

    /// `None` if `id` is not watched.
    pub async fn state(&self, id: HandleId) -> Result<Option<ReloadState>> {
        self.request(|reply| Command::State { id, reply }).await
    }

    /// Cancel every poll task and stop the supervisor. Later calls fail with
    /// [`ProptreeError::ReloadStopped`].
    pub async fn shutdown(&self) -> Result<()> {
        let acknowledged = self.request(|reply| Command::Shutdown { reply }).await;
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "reload supervisor did not stop cleanly");
        }
        acknowledged
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ProptreeError::ReloadStopped)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response.await.map_err(|_| ProptreeError::ReloadStopped)
    }
}

impl Drop for ReloadService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for ReloadService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadService")
            .field("running", &self.is_running())
            .finish()
    }
}

enum Schedule {
    Active(CancellationToken),
    Suspended,
    Static,
}

struct Entry {
    handle: ConfigHandle,
    resource: Arc<dyn Resource>,
    schedule: Schedule,
    /// Distinguishes this watch from earlier watches of the same handle.
    watch: u64,
    /// Numbers the reads; shared with every poll task of this entry.
    reads: Arc<AtomicU64>,
    /// Sequence of the newest installed read.
    installed: u64,
    pending: Option<Pending>,
}

impl Entry {
    fn state(&self) -> ReloadState {
        match self.schedule {
            Schedule::Active(_) => ReloadState::Active,
            Schedule::Suspended => ReloadState::Suspended,
            Schedule::Static => ReloadState::Static,
        }
    }

    fn cancel(&mut self) {
        if let Schedule::Active(token) = &self.schedule {
            token.cancel();
        }
    }
}

struct Supervisor {
    loader: Arc<Loader>,
    min_check_every: Duration,
    entries: HashMap<HandleId, Entry>,
    swaps: mpsc::UnboundedSender<Swap>,
    shutdown: CancellationToken,
}

impl Supervisor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut swaps: mpsc::UnboundedReceiver<Swap>,
    ) {
        loop {
            select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.apply(command),
                    None => break,
                },
                Some(swap) = swaps.recv() => self.swap(swap),
            }
        }
        for entry in self.entries.values_mut() {
            entry.cancel();
        }
        self.shutdown.cancel();
        info!(watched = self.entries.len(), "reload service stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Watch { handle, resource } => self.watch(handle, resource),
            Command::Unwatch(id) => {
                if let Some(mut entry) = self.entries.remove(&id) {
                    entry.cancel();
                    debug!(handle = %id, configuration = %entry.handle.name(), "reload cancelled");
                }
            }
            Command::Suspend { id, reply } => {
                let count = self
                    .targets(id)
                    .into_iter()
                    .filter(|id| self.suspend(*id))
                    .count();
                let _ = reply.send(count);
            }
            Command::Resume { id, reply } => {
                let count = self
                    .targets(id)
                    .into_iter()
                    .filter(|id| self.resume(*id))
                    .count();
                let _ = reply.send(count);
            }
            Command::State { id, reply } => {
                let _ = reply.send(self.entries.get(&id).map(Entry::state));
            }
            // Handled by the run loop.
            Command::Shutdown { .. } => {}
        }
    }

    fn targets(&self, id: Option<HandleId>) -> Vec<HandleId> {
        match id {
            Some(id) => vec![id],
            None => self.entries.keys().copied().collect(),
        }
    }

    fn watch(&mut self, handle: ConfigHandle, resource: Arc<dyn Resource>) {
        let id = handle.id();
        let mut entry = Entry {
            handle,
            resource,
            schedule: Schedule::Static,
            watch: NEXT_WATCH.fetch_add(1, Ordering::Relaxed),
            reads: Arc::new(AtomicU64::new(0)),
            installed: 0,
            pending: None,
        };
        if let Some(mut previous) = self.entries.remove(&id) {
            previous.cancel();
            // Re-watching the same resource keeps reads that are still in
            // flight, and any deferred one, valid.
            if Arc::ptr_eq(&previous.resource, &entry.resource) {
                entry.watch = previous.watch;
                entry.reads = previous.reads;
                entry.installed = previous.installed;
                if let Some(pending) = previous.pending
                    && pending.sequence > entry.installed
                {
                    entry.installed = pending.sequence;
                    entry.handle.set_configuration(pending.configuration);
                }
            }
        }
        let policy = entry.handle.current().reload_policy().copied();
        self.entries.insert(id, entry);
        self.schedule(id, policy);
    }

    fn suspend(&mut self, id: HandleId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if !matches!(entry.schedule, Schedule::Active(_)) {
            return false;
        }
        entry.cancel();
        entry.schedule = Schedule::Suspended;
        info!(handle = %id, configuration = %entry.handle.name(), "reload suspended");
        true
    }

    fn resume(&mut self, id: HandleId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if !matches!(entry.schedule, Schedule::Suspended) {
            return false;
        }
        if let Some(pending) = entry.pending.take()
            && pending.sequence > entry.installed
        {
            entry.installed = pending.sequence;
            info!(
                handle = %id,
                configuration = %pending.configuration.name(),
                version = %pending.configuration.version(),
                "deferred reload applied"
            );
            entry.handle.set_configuration(pending.configuration);
        }
        let policy = entry.handle.current().reload_policy().copied();
        self.schedule(id, policy);
        info!(handle = %id, "reload resumed");
        true
    }

    /// (Re)start polling for `id` under `policy`, or mark it static.
    fn schedule(&mut self, id: HandleId, policy: Option<ReloadPolicy>) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.cancel();

        let Some(policy) = policy.filter(ReloadPolicy::is_scheduled) else {
            entry.schedule = Schedule::Static;
            debug!(handle = %id, configuration = %entry.handle.name(), "configuration is static");
            return;
        };

        let every = policy.check_every.max(self.min_check_every);
        let token = self.shutdown.child_token();
        let poll = Poll {
            id,
            watch: entry.watch,
            reads: Arc::clone(&entry.reads),
            every,
            name: entry.handle.name(),
            resource: Arc::clone(&entry.resource),
            loader: Arc::clone(&self.loader),
            swaps: self.swaps.clone(),
            cancel: token.clone(),
        };
        tokio::spawn(poll.run());
        entry.schedule = Schedule::Active(token);
        info!(
            handle = %id,
            configuration = %entry.handle.name(),
            every_secs = every.as_secs(),
            "reload scheduled"
        );
    }

    fn swap(&mut self, swap: Swap) {
        let Swap {
            id,
            watch,
            sequence,
            configuration,
        } = swap;
        let Some(entry) = self.entries.get_mut(&id) else {
            debug!(handle = %id, "dropping reload for unwatched configuration");
            return;
        };
        if entry.watch != watch || sequence <= entry.installed {
            debug!(handle = %id, sequence, "dropping superseded reload");
            return;
        }
        if !matches!(entry.schedule, Schedule::Active(_)) {
            if entry
                .pending
                .as_ref()
                .is_none_or(|pending| pending.sequence < sequence)
            {
                debug!(handle = %id, sequence, "reload deferred until resumed");
                entry.pending = Some(Pending {
                    sequence,
                    configuration,
                });
            }
            return;
        }

        let old_policy = entry.handle.current().reload_policy().copied();
        let new_policy = configuration.reload_policy().copied();
        info!(
            handle = %id,
            configuration = %configuration.name(),
            version = %configuration.version(),
            "reload applied"
        );
        entry.installed = sequence;
        entry.pending = None;
        entry.handle.set_configuration(configuration);

        if old_policy != new_policy {
            self.schedule(id, new_policy);
        }
    }
}

/// One configuration's polling loop.
struct Poll {
    id: HandleId,
    watch: u64,
    reads: Arc<AtomicU64>,
    every: Duration,
    name: String,
    resource: Arc<dyn Resource>,
    loader: Arc<Loader>,
    swaps: mpsc::UnboundedSender<Swap>,
    cancel: CancellationToken,
}

impl Poll {
    async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.every, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if !self.resource.is_changed() {
                continue;
            }

            let sequence = self.reads.fetch_add(1, Ordering::Relaxed) + 1;
            let loader = Arc::clone(&self.loader);
            let resource = Arc::clone(&self.resource);
            let mut read = tokio::task::spawn_blocking(move || loader.reload(resource.as_ref()));
            // A read in flight has already consumed the change marker, so its
            // result is forwarded even when the task is cancelled meanwhile.
            let cancelled = select! {
                biased;
                outcome = &mut read => {
                    self.forward(sequence, outcome);
                    false
                }
                _ = self.cancel.cancelled() => true,
            };
            if cancelled {
                self.forward(sequence, read.await);
                break;
            }
        }
        debug!(handle = %self.id, "poll task exited");
    }

    fn forward(
        &self,
        sequence: u64,
        outcome: std::result::Result<Result<Option<Configuration>>, JoinError>,
    ) {
        match outcome {
            Ok(Ok(Some(configuration))) => {
                let swap = Swap {
                    id: self.id,
                    watch: self.watch,
                    sequence,
                    configuration,
                };
                if self.swaps.send(swap).is_err() {
                    debug!(handle = %self.id, "reload service gone; dropping reload");
                }
            }
            Ok(Ok(None)) => warn!(
                configuration = %self.name,
                location = self.resource.name(),
                "resource is gone; keeping current configuration"
            ),
            Ok(Err(e)) => error!(
                configuration = %self.name,
                location = self.resource.name(),
                error = %e,
                "reload failed; keeping current configuration"
            ),
            Err(e) => error!(
                configuration = %self.name,
                location = self.resource.name(),
                error = %e,
                "reload task failed; keeping current configuration"
            ),
        }
    }
}
