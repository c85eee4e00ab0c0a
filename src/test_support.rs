// ABOUTME: In-memory host and helpers for unit tests.
// ABOUTME: Lets tests fail any host call and park writes until released.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::SettingsError;
use crate::host::{PathResolver, TextFiles};

pub const TEST_APP_DATA: &str = "/data/cwal";
pub const TEST_HOME: &str = "/home/tester";

#[derive(Clone)]
pub struct MemoryHost {
    inner: Arc<MemoryHostInner>,
    app_data: Option<PathBuf>,
    home: Option<PathBuf>,
}

#[derive(Default)]
struct MemoryHostInner {
    files: Mutex<HashMap<PathBuf, String>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    gated_writes: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            app_data: Some(PathBuf::from(TEST_APP_DATA)),
            home: Some(PathBuf::from(TEST_HOME)),
        }
    }

    pub fn without_home(mut self) -> Self {
        self.home = None;
        self
    }

    pub fn without_app_data(mut self) -> Self {
        self.app_data = None;
        self
    }

    pub fn settings_path() -> PathBuf {
        Path::new(TEST_APP_DATA).join("settings.json")
    }

    pub fn with_settings_file(self, content: &str) -> Self {
        self.inner
            .files
            .lock()
            .unwrap()
            .insert(Self::settings_path(), content.to_string());
        self
    }

    pub fn settings_file_content(&self) -> Option<String> {
        self.inner.files.lock().unwrap().get(&Self::settings_path()).cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Completed writes.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Writes that picked up a gate, whether or not it has been released.
    pub fn gated_writes(&self) -> usize {
        self.inner.gated_writes.load(Ordering::SeqCst)
    }

    /// The next write to start parks until the returned sender fires (or is dropped).
    pub fn gate_next_write(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.gates.lock().unwrap().push_back(rx);
        tx
    }
}

impl PathResolver for MemoryHost {
    async fn app_data_dir(&self) -> Result<PathBuf, SettingsError> {
        self.app_data.clone().ok_or_else(|| SettingsError::PathResolution {
            what: "app data directory",
            reason: "not available in this test".to_string(),
        })
    }

    async fn home_dir(&self) -> Result<PathBuf, SettingsError> {
        self.home.clone().ok_or_else(|| SettingsError::PathResolution {
            what: "home directory",
            reason: "not available in this test".to_string(),
        })
    }
}

impl TextFiles for MemoryHost {
    async fn read_text(&self, path: &Path) -> Result<String, SettingsError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(SettingsError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read denied"),
            });
        }
        Ok(self.inner.files.lock().unwrap().get(path).cloned().unwrap_or_default())
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<(), SettingsError> {
        let gate = self.inner.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            self.inner.gated_writes.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(SettingsError::FileWrite {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "write denied"),
            });
        }
        self.inner
            .files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Yield to other tasks until `condition` holds.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
