//! Alert side effects and the background tasks behind them.
//!
//! Both tasks run on their own thread and stop when their stop channel
//! receives a message or is disconnected. Neither touches tracking state.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::integration::detector::Frame;
use crate::integration::events::EventRecord;
use crate::tracker::{Alert, Rect};

/// Stop-signal polling period of the siren loop.
const SIREN_POLL: Duration = Duration::from_millis(100);

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Side effects of alerts: snapshots, the siren and the event log.
///
/// Every method has a no-op default.
pub trait AlertSink {
    /// Save `region` of `frame` (the full frame when `None`). Returns the
    /// saved image path.
    fn snapshot(&mut self, _alert: &Alert, _frame: &Frame<'_>, _region: Option<Rect>) -> Option<PathBuf> {
        None
    }

    /// Sound the siren for `duration`, restarting it if already running.
    fn start_siren(&mut self, _duration: Duration) {}

    fn stop_siren(&mut self) {}

    fn record(&mut self, _event: &EventRecord) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AlertSink for NullSink {}

/// Cancellable siren worker.
///
/// Calls `tick` every 100 ms until stopped or `duration` has passed.
#[derive(Debug)]
pub struct SirenTask {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<u32>>,
}

impl SirenTask {
    pub fn spawn<F>(duration: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let mut ticks = 0;
            while started.elapsed() < duration {
                tick();
                ticks += 1;
                match stop_rx.recv_timeout(SIREN_POLL) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            ticks
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the worker and wait for it. Returns the number of ticks played.
    pub fn stop(mut self) -> u32 {
        self.join()
    }

    fn join(&mut self) -> u32 {
        let _ = self.stop_tx.try_send(());
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(ticks)) => ticks,
            Some(Err(_)) => {
                log::warn!("siren worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for SirenTask {
    fn drop(&mut self) {
        self.join();
    }
}

/// Delete regular files in `dir` last modified more than `retention`
/// before `now`. A missing directory holds nothing to delete.
pub fn purge_old_snapshots(dir: &Path, retention: Duration, now: SystemTime) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let expired = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);
        if !expired {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("could not delete snapshot {}: {e}", path.display()),
        }
    }
    if removed > 0 {
        log::info!("deleted {removed} old snapshots from {}", dir.display());
    }
    Ok(removed)
}

/// Periodic snapshot cleanup on a worker thread.
#[derive(Debug)]
pub struct SnapshotJanitor {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotJanitor {
    /// Purge `dir` now and then once every `period`, keeping files newer
    /// than `retention`.
    pub fn spawn(dir: PathBuf, retention: Duration, period: Duration) -> Self {
        let (stop_tx, stop_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let handle = thread::spawn(move || {
            loop {
                if let Err(e) = purge_old_snapshots(&dir, retention, SystemTime::now()) {
                    log::warn!("snapshot cleanup failed: {e}");
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Janitor over `alert_snapshots_dir`, keeping `snapshot_retention_days`.
    pub fn from_config(storage: &StorageConfig, period: Duration) -> Self {
        let retention = Duration::from_secs(storage.snapshot_retention_days * SECONDS_PER_DAY);
        Self::spawn(storage.alert_snapshots_dir.clone(), retention, period)
    }

    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(Err(_)) = self.handle.take().map(JoinHandle::join) {
            log::warn!("snapshot janitor panicked");
        }
    }
}

impl Drop for SnapshotJanitor {
    fn drop(&mut self) {
        self.join();
    }
}
