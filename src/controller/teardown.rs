//! Shutdown signal sources.
//!
//! A controller registers a flush hook on whatever source the host provides.
//! [`ManualTeardown`] runs hooks synchronously, so a flush is complete when
//! `fire` returns. [`ChannelTeardown`] runs them on a watcher thread; a plain
//! `signal` does not wait, so the flush is best-effort if the process exits
//! right after.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Work to run at shutdown.
pub type TeardownHook = Box<dyn FnOnce() + Send + 'static>;

/// Something that announces process or session shutdown.
pub trait TeardownSource {
    /// Run `hook` once, when shutdown is signalled.
    fn register(&self, hook: TeardownHook);
}

fn run_hooks(hooks: Vec<TeardownHook>) -> usize {
    let count = hooks.len();
    for hook in hooks {
        hook();
    }
    count
}

/// Teardown driven by an explicit, blocking call.
#[derive(Default)]
pub struct ManualTeardown {
    hooks: Mutex<Vec<TeardownHook>>,
    fired: AtomicBool,
}

impl ManualTeardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every registered hook on the calling thread. Returns how many ran.
    ///
    /// Hooks registered after firing run immediately on registration.
    pub fn fire(&self) -> usize {
        let hooks = {
            let mut hooks = self.hooks.lock();
            self.fired.store(true, Ordering::SeqCst);
            std::mem::take(&mut *hooks)
        };
        let count = run_hooks(hooks);
        tracing::info!(hooks = count, "teardown fired");
        count
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Hooks waiting for `fire`.
    pub fn pending(&self) -> usize {
        self.hooks.lock().len()
    }
}

impl TeardownSource for ManualTeardown {
    fn register(&self, hook: TeardownHook) {
        let mut hooks = self.hooks.lock();
        if self.has_fired() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(hook);
    }
}

/// Cloneable handle that requests teardown from any thread.
#[derive(Clone)]
pub struct TeardownTrigger {
    sender: Sender<()>,
}

impl TeardownTrigger {
    /// Request teardown. Returns false when the watcher is already gone.
    pub fn signal(&self) -> bool {
        self.sender.try_send(()).is_ok()
    }
}

/// Teardown observed by a background watcher thread.
///
/// Hooks registered after the watcher has run execute immediately on the
/// registering thread.
pub struct ChannelTeardown {
    trigger: TeardownTrigger,
    hooks: Arc<Mutex<Vec<TeardownHook>>>,
    fired: Arc<AtomicBool>,
    done: Receiver<usize>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelTeardown {
    /// Spawn the watcher.
    pub fn new() -> Self {
        let (sender, signals) = bounded::<()>(1);
        let (done_tx, done) = unbounded();
        let hooks: Arc<Mutex<Vec<TeardownHook>>> = Arc::new(Mutex::new(Vec::new()));

        let fired = Arc::new(AtomicBool::new(false));

        let watched = Arc::clone(&hooks);
        let watched_fired = Arc::clone(&fired);
        let watcher = thread::Builder::new()
            .name("ledger-teardown".into())
            .spawn(move || {
                // A closed channel means nobody can signal any more.
                if signals.recv().is_ok() {
                    let pending = {
                        let mut hooks = watched.lock();
                        watched_fired.store(true, Ordering::SeqCst);
                        std::mem::take(&mut *hooks)
                    };
                    let count = run_hooks(pending);
                    tracing::info!(hooks = count, "teardown signalled");
                    let _ = done_tx.send(count);
                }
            });

        let watcher = match watcher {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "could not spawn teardown watcher");
                None
            }
        };

        Self {
            trigger: TeardownTrigger { sender },
            hooks,
            fired,
            done,
            watcher: Mutex::new(watcher),
        }
    }

    /// A handle other threads can signal through.
    pub fn trigger(&self) -> TeardownTrigger {
        self.trigger.clone()
    }

    /// Whether the watcher has taken the registered hooks.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Request teardown without waiting for the hooks.
    pub fn signal(&self) -> bool {
        self.trigger.signal()
    }

    /// Request teardown and wait up to `timeout` for the hooks to finish.
    ///
    /// Returns the number of hooks that ran, or None on timeout.
    pub fn signal_and_wait(&self, timeout: Duration) -> Option<usize> {
        self.signal();
        let count = self.done.recv_timeout(timeout).ok()?;
        if let Some(handle) = self.watcher.lock().take() {
            let _ = handle.join();
        }
        Some(count)
    }
}

impl Default for ChannelTeardown {
    fn default() -> Self {
        Self::new()
    }
}

impl TeardownSource for ChannelTeardown {
    fn register(&self, hook: TeardownHook) {
        let mut hooks = self.hooks.lock();
        if self.has_fired() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(hook);
    }
}
