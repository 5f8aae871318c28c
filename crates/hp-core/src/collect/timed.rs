//! Timeout-bounded evidence source.

use super::{
    EvidenceSource, IpVersion, KernelModule, LoginRecord, Neighbor, ProcessEntry, SourceError,
    TcpConnection, UdpSocket,
};
use crate::logging::event_names;
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs each snapshot fetch of the wrapped source on a helper thread and
/// gives up after `timeout`.
///
/// A fetch that times out keeps running detached; its result is dropped.
/// Until it returns, further fetches of the same snapshot fail at once
/// instead of stacking up another thread, so at most one helper thread per
/// snapshot kind is ever alive. `path_exists` is a single stat and is not
/// bounded.
pub struct TimedSource<S> {
    inner: Arc<S>,
    timeout: Duration,
    in_flight: Arc<Mutex<HashSet<&'static str>>>,
}

/// Marks a snapshot kind busy until the helper thread drops it.
struct InFlight {
    set: Arc<Mutex<HashSet<&'static str>>>,
    source_name: &'static str,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<&'static str>>>, source_name: &'static str) -> Option<Self> {
        let mut busy = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(source_name) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            source_name,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.source_name);
    }
}

impl<S: EvidenceSource + 'static> TimedSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_default_timeout(inner: S) -> Self {
        Self::new(inner, DEFAULT_SNAPSHOT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn bounded<T, F>(&self, source_name: &'static str, fetch: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, SourceError> + Send + 'static,
    {
        let Some(guard) = InFlight::claim(&self.in_flight, source_name) else {
            debug!(
                event = event_names::SOURCE_FAILED,
                source = source_name,
                "previous snapshot fetch still running"
            );
            return Err(SourceError::Unavailable {
                source_name,
                reason: "previous fetch still running".to_string(),
            });
        };

        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();

        // A failed spawn drops the closure, and the guard with it.
        thread::Builder::new()
            .name(format!("hp-fetch-{source_name}"))
            .spawn(move || {
                let _guard = guard;
                // Receiver is gone after a timeout.
                let _ = tx.send(fetch(&inner));
            })
            .map_err(|e| SourceError::Unavailable {
                source_name,
                reason: format!("cannot spawn fetch thread: {e}"),
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    event = event_names::SOURCE_TIMEOUT,
                    source = source_name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "snapshot fetch timed out"
                );
                Err(SourceError::Timeout {
                    source_name,
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Unavailable {
                source_name,
                reason: "fetch thread exited without a result".to_string(),
            }),
        }
    }
}

impl<S: EvidenceSource + 'static> EvidenceSource for TimedSource<S> {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, SourceError> {
        self.bounded("processes", |s| s.list_processes())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.inner.path_exists(path)
    }

    fn list_kernel_modules(&self) -> Result<Vec<KernelModule>, SourceError> {
        self.bounded("kernel_modules", |s| s.list_kernel_modules())
    }

    fn list_tcp(&self, version: IpVersion) -> Result<Vec<TcpConnection>, SourceError> {
        self.bounded("tcp", move |s| s.list_tcp(version))
    }

    fn list_udp(&self, version: IpVersion) -> Result<Vec<UdpSocket>, SourceError> {
        self.bounded("udp", move |s| s.list_udp(version))
    }

    fn list_neighbors(&self) -> Result<Vec<Neighbor>, SourceError> {
        self.bounded("neighbors", |s| s.list_neighbors())
    }

    fn list_login_records(&self) -> Result<Vec<LoginRecord>, SourceError> {
        self.bounded("login_records", |s| s.list_login_records())
    }

    fn init_cgroup(&self) -> Result<String, SourceError> {
        self.bounded("init_cgroup", |s| s.init_cgroup())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeSource;
    use std::time::Instant;

    #[test]
    fn test_fast_source_passes_through() {
        let source = TimedSource::new(
            FakeSource::new().with_process(1, "init"),
            Duration::from_secs(2),
        );
        let processes = source.list_processes().unwrap();
        assert_eq!(processes, vec![ProcessEntry::new(1, "init")]);
    }

    #[test]
    fn test_slow_source_times_out() {
        let source = TimedSource::new(
            FakeSource::new().with_delay(Duration::from_millis(500)),
            Duration::from_millis(50),
        );

        let start = Instant::now();
        let err = source.list_neighbors().unwrap_err();
        assert!(start.elapsed() < Duration::from_millis(450));
        match err {
            SourceError::Timeout {
                source_name,
                timeout,
            } => {
                assert_eq!(source_name, "neighbors");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_hung_fetch_is_not_stacked() {
        let source = TimedSource::new(
            FakeSource::new().with_delay(Duration::from_millis(300)),
            Duration::from_millis(10),
        );

        assert!(matches!(
            source.list_login_records(),
            Err(SourceError::Timeout { .. })
        ));
        for _ in 0..5 {
            match source.list_login_records() {
                Err(SourceError::Unavailable { source_name, .. }) => {
                    assert_eq!(source_name, "login_records")
                }
                other => panic!("expected busy source, got {other:?}"),
            }
        }
        assert_eq!(source.inner().fetches_started(), 1);

        // Other snapshot kinds are not blocked by the hung one.
        assert!(matches!(
            source.list_neighbors(),
            Err(SourceError::Timeout { .. })
        ));
        assert_eq!(source.inner().fetches_started(), 2);
    }

    #[test]
    fn test_fetch_allowed_again_after_hung_one_returns() {
        let source = TimedSource::new(
            FakeSource::new().with_delay(Duration::from_millis(60)),
            Duration::from_millis(5),
        );
        assert!(source.list_processes().is_err());

        let deadline = Instant::now() + Duration::from_secs(5);
        while source.inner().process_calls() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        // The helper bumps the counter just before it sends and exits.
        std::thread::sleep(Duration::from_millis(20));

        assert!(matches!(
            source.list_processes(),
            Err(SourceError::Timeout { .. })
        ));
        assert_eq!(source.inner().fetches_started(), 2);
    }

    #[test]
    fn test_inner_errors_are_forwarded() {
        let source = TimedSource::with_default_timeout(FakeSource::new().failing_modules());
        assert!(matches!(
            source.list_kernel_modules(),
            Err(SourceError::Unavailable { .. })
        ));
        assert_eq!(source.timeout(), DEFAULT_SNAPSHOT_TIMEOUT);
    }
}
