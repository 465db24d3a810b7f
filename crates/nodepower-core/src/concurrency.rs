use crate::CoreError;
use fs2::FileExt;
use nodepower_client::Context;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Exclusive advisory lock serializing passes over one node resource.
///
/// Held for the whole read-reconcile-write cycle so two processes never
/// reconcile the same node at once.
pub struct NodeLock {
    lock_file: File,
    path: PathBuf,
}

/// `<resource>.lock` next to the resource file.
pub fn lock_path_for(resource: &Path) -> PathBuf {
    let mut name = resource
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("node"));
    name.push(".lock");
    resource.with_file_name(name)
}

/// The resource's directory must already exist; it is never created here.
fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl NodeLock {
    pub fn acquire(resource: &Path) -> Result<Self, CoreError> {
        let path = lock_path_for(resource);
        let file = open_lock_file(&path)?;

        file.lock_exclusive()
            .map_err(|e| CoreError::Lock(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;

        Ok(Self {
            lock_file: file,
            path,
        })
    }

    /// `Ok(None)` when another holder already owns the lock.
    pub fn try_acquire(resource: &Path) -> Result<Option<Self>, CoreError> {
        let path = lock_path_for(resource);
        let file = open_lock_file(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file: file,
                path,
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NodeLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Cancel `ctx` on the first Ctrl-C; exit on the second.
///
/// Only one handler can be installed per process; later calls are ignored.
pub fn install_signal_handler(ctx: &Context) {
    let ctx = ctx.clone();
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        ctx.cancel();
        eprintln!("\nshutdown requested, abandoning current pass...");
    });
}

/// Sleep for `duration` in short slices. Returns `false` as soon as `ctx`
/// is cancelled, `true` when the full duration elapsed.
pub fn sleep_unless_cancelled(ctx: &Context, duration: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let end = Instant::now() + duration;
    loop {
        if ctx.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= end {
            return true;
        }
        std::thread::sleep(SLICE.min(end - now));
    }
}
