//! Content reads that absorb transient remote-share disconnects

use crate::fs::Filesystem;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::time::Duration;

#[derive(Debug)]
pub enum ReadOutcome {
    Content(Vec<u8>),
    /// Every attempt failed with a transient error
    TransientFailure { attempts: u32, last_error: io::Error },
    PermissionDenied,
    /// A non-transient error; never retried
    Failed(io::Error),
}

/// Whether an error is the kind a flaky remote share produces
pub fn is_transient(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
    ) {
        return true;
    }

    match error.raw_os_error() {
        // ERROR_NETNAME_DELETED, ERROR_UNEXP_NET_ERR, ERROR_SEM_TIMEOUT
        #[cfg(windows)]
        Some(64 | 59 | 121) => true,
        // ESTALE, EHOSTDOWN, EHOSTUNREACH
        #[cfg(target_os = "linux")]
        Some(116 | 112 | 113) => true,
        #[cfg(target_os = "macos")]
        Some(70 | 64 | 65) => true,
        _ => false,
    }
}

/// Read a file, retrying transient failures with doubling backoff
///
/// `attempts` is the total number of reads; the delay before retry `n` is
/// `base_delay * 2^(n-1)`. At most `limit + 1` bytes are read, so callers can
/// tell a file that outgrew `limit` from one that fits.
pub fn read_with_retry(
    fs: &dyn Filesystem,
    path: &Path,
    attempts: u32,
    base_delay: Duration,
    limit: u64,
) -> ReadOutcome {
    let attempts = attempts.max(1);
    let mut delay = base_delay;

    for attempt in 1..=attempts {
        match fs.read_capped(path, limit) {
            Ok(content) => return ReadOutcome::Content(content),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return ReadOutcome::PermissionDenied;
            }
            Err(e) if is_transient(&e) => {
                if attempt == attempts {
                    return ReadOutcome::TransientFailure {
                        attempts,
                        last_error: e,
                    };
                }
                tracing::debug!(
                    "Transient read error on {} (attempt {attempt}/{attempts}): {e}; \
                     retrying in {delay:?}",
                    path.display()
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
            }
            Err(e) => return ReadOutcome::Failed(e),
        }
    }

    // attempts >= 1 means the loop always returns
    ReadOutcome::Failed(io::Error::other("no read attempted"))
}
