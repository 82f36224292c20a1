//! Linear mixing rounds over a set of in-process nodes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tessera_core::{sync, LinearMixable, MixableHelper, TesseraError, Version};

/// Outcome of one mixing round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixReport {
    /// Number of nodes that took part.
    pub nodes: usize,
    /// Number of nodes that accepted the merged diff.
    pub applied: usize,
    /// Indices of nodes that refused it, in registration order.
    pub rejected: Vec<usize>,
    /// Version the merged diff was tagged with.
    pub version: Version,
}

/// Runs get_diff → mix → put_diff rounds across registered nodes.
///
/// Every node is a [`MixableHelper`], so stale nodes reject the merged diff
/// instead of applying it against the wrong state. A node that keeps
/// rejecting can be brought back with [`LinearMixer::resync`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::MixableHelper;
/// use tessera_mix::LinearMixer;
/// use tessera_stat::Stat;
///
/// let mixer = LinearMixer::new();
/// let a = Arc::new(Stat::new(10));
/// let b = Arc::new(Stat::new(10));
/// mixer.register(MixableHelper::new(a.clone()));
/// mixer.register(MixableHelper::new(b.clone()));
///
/// a.push("x", 1.0);
/// b.push("y", 1.0);
/// let report = mixer.mix_round();
/// assert_eq!(report.applied, 2);
/// assert_eq!(a.mixed_entropy(), b.mixed_entropy());
/// ```
pub struct LinearMixer<M: LinearMixable + ?Sized> {
    nodes: RwLock<Vec<MixableHelper<M>>>,
}

impl<M: LinearMixable + ?Sized> Default for LinearMixer<M> {
    fn default() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }
}

impl<M: LinearMixable + ?Sized> std::fmt::Debug for LinearMixer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMixer")
            .field("nodes", &self.len())
            .finish()
    }
}

impl<M: LinearMixable + ?Sized> LinearMixer<M> {
    /// Creates a mixer with no nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Returns its index.
    pub fn register(&self, node: MixableHelper<M>) -> usize {
        let mut nodes = sync::write(&self.nodes);
        nodes.push(node);
        nodes.len() - 1
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        sync::read(&self.nodes).len()
    }

    /// Returns `true` if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The node registered at `index`.
    pub fn node(&self, index: usize) -> Option<MixableHelper<M>> {
        sync::read(&self.nodes).get(index).cloned()
    }

    /// Runs one round: collects every node's diff, folds them with
    /// `mix`, and offers the result to every node.
    pub fn mix_round(&self) -> MixReport {
        let nodes = sync::read(&self.nodes).clone();
        let Some(first) = nodes.first() else {
            return MixReport::default();
        };

        let mut diffs = nodes.iter().map(MixableHelper::get_diff);
        let Some(seed) = diffs.next() else {
            return MixReport::default();
        };
        let merged = diffs.fold(seed, |acc, diff| first.mix(&acc, &diff));

        let mut report = MixReport {
            nodes: nodes.len(),
            version: merged.version,
            ..MixReport::default()
        };
        for (i, node) in nodes.iter().enumerate() {
            let applied = node.put_diff(&merged);
            tracing::debug!(node = i, applied, version = %node.version(), "offered merged diff");
            if applied {
                report.applied += 1;
            } else {
                report.rejected.push(i);
            }
        }

        tracing::info!(
            nodes = report.nodes,
            applied = report.applied,
            rejected = ?report.rejected,
            version = %report.version,
            "mix round complete"
        );
        report
    }

    /// Replaces the state of node `to` with the packed state of node `from`.
    ///
    /// # Errors
    ///
    /// [`TesseraError::Internal`] if either index is out of range, or the
    /// error of the underlying pack / unpack.
    pub fn resync(&self, from: usize, to: usize) -> Result<(), TesseraError> {
        let (source, target) = {
            let nodes = sync::read(&self.nodes);
            match (nodes.get(from), nodes.get(to)) {
                (Some(s), Some(t)) => (s.clone(), t.clone()),
                _ => {
                    return Err(TesseraError::Internal {
                        message: format!(
                            "resync {from} -> {to} out of range for {} nodes",
                            nodes.len()
                        ),
                    })
                }
            }
        };
        target.unpack(&source.pack()?)?;
        tracing::info!(from, to, version = %target.version(), "resynchronized node");
        Ok(())
    }
}

impl<M: LinearMixable + ?Sized + 'static> LinearMixer<M> {
    /// Runs [`LinearMixer::mix_round`] every `interval` on a dedicated
    /// thread until the returned handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// [`TesseraError::Internal`] if the thread cannot be spawned.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> Result<MixerHandle, TesseraError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let rounds = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&rounds);

        let thread = thread::Builder::new()
            .name("tessera-mixer".into())
            .spawn(move || {
                tracing::info!(interval_ms = interval.as_millis() as u64, "mixer started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.mix_round();
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!(rounds = counter.load(Ordering::Relaxed), "mixer stopped");
            })
            .map_err(|e| TesseraError::Internal {
                message: format!("failed to spawn mixer thread: {e}"),
            })?;

        Ok(MixerHandle {
            stop: Some(stop),
            thread: Some(thread),
            rounds,
        })
    }
}

/// Controls a background mixing thread. Dropping the handle stops it.
#[derive(Debug)]
pub struct MixerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    rounds: Arc<AtomicU64>,
}

impl MixerHandle {
    /// Rounds completed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Stops the thread and waits for the round in progress to finish.
    /// Returns the number of rounds run.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.rounds()
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("mixer thread panicked");
            }
        }
    }
}

impl Drop for MixerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
