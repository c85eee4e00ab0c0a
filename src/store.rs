// ABOUTME: Owns the user settings record: loads it once at startup, falls back to defaults, re-persists on change.
// ABOUTME: Every I/O failure is logged and absorbed so callers only ever see a usable record.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::error::SettingsError;
use crate::host::{PathResolver, TextFiles};
use crate::settings::{SETTINGS_FILE_NAME, Settings, SettingsPatch};

/// Settings store with an explicit Uninitialized -> Ready lifecycle.
///
/// Accessors work before initialization completes but return the empty
/// placeholder record; check [`SettingsStore::is_initialized`] or await
/// [`SettingsStore::wait_until_ready`] first.
///
/// Mutating operations are not serialized against each other. Overlapping
/// calls each persist the snapshot they produced, so whichever write finishes
/// last is what ends up on disk while memory holds the last applied change.
/// Callers serialize through the saving flags.
pub struct SettingsStore<H> {
    host: H,
    state: Mutex<StoreState>,
    ready: watch::Sender<bool>,
}

#[derive(Default)]
struct StoreState {
    settings: Settings,
    settings_file: Option<PathBuf>,
    init_started: bool,
    saving_replay_path: bool,
    saving_map_path: bool,
}

#[derive(Debug, Clone, Copy)]
enum SavingField {
    ReplayPath,
    MapPath,
}

/// Holds a saving flag up until dropped, including when the save is cancelled.
struct SavingGuard<'a, H> {
    store: &'a SettingsStore<H>,
    field: SavingField,
}

impl<'a, H> SavingGuard<'a, H> {
    fn raise(store: &'a SettingsStore<H>, field: SavingField) -> Self {
        store.set_saving(field, true);
        Self { store, field }
    }
}

impl<H> Drop for SavingGuard<'_, H> {
    fn drop(&mut self) {
        self.store.set_saving(self.field, false);
    }
}

impl<H> SettingsStore<H> {
    /// A store in the Uninitialized state. Nothing is read until [`SettingsStore::initialize`].
    pub fn new(host: H) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            host,
            state: Mutex::new(StoreState::default()),
            ready,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_saving(&self, field: SavingField, saving: bool) {
        let mut state = self.state();
        match field {
            SavingField::ReplayPath => state.saving_replay_path = saving,
            SavingField::MapPath => state.saving_map_path = saving,
        }
    }

    pub fn settings(&self) -> Settings {
        self.state().settings.clone()
    }

    /// Where the record is persisted, once initialization has resolved it.
    pub fn settings_file(&self) -> Option<PathBuf> {
        self.state().settings_file.clone()
    }

    pub fn is_initialized(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn is_saving_replay_path(&self) -> bool {
        self.state().saving_replay_path
    }

    pub fn is_saving_map_path(&self) -> bool {
        self.state().saving_map_path
    }

    pub async fn wait_until_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = ready.wait_for(|ready| *ready).await;
    }
}

impl<H: PathResolver + TextFiles> SettingsStore<H> {
    /// Construct and initialize in one step.
    #[cfg(test)]
    pub async fn open(host: H) -> Self {
        let store = Self::new(host);
        store.initialize().await;
        store
    }

    /// Resolve the settings file, load it or fall back to defaults, then become Ready.
    /// Runs once; later calls return immediately.
    pub async fn initialize(&self) {
        {
            let mut state = self.state();
            if state.init_started {
                tracing::debug!("Settings store already initialized");
                return;
            }
            state.init_started = true;
        }

        match self.host.app_data_dir().await {
            Ok(dir) => {
                let path = dir.join(SETTINGS_FILE_NAME);
                self.state().settings_file = Some(path.clone());
                self.load(&path).await;
            }
            Err(e) => {
                tracing::error!("Failed to initialize settings store: {e}");
                self.apply_defaults().await;
            }
        }

        self.ready.send_replace(true);
        tracing::info!("Settings store ready");
    }

    async fn load(&self, path: &Path) {
        match self.read_persisted(path).await {
            Ok(Some(settings)) => {
                tracing::info!("Loaded settings from {}", path.display());
                self.state().settings = settings;
            }
            Ok(None) => {
                tracing::info!("Settings file is empty or missing, writing defaults");
                self.apply_defaults().await;
            }
            Err(e) => {
                tracing::warn!("Failed to load settings (using defaults): {e}");
                self.apply_defaults().await;
            }
        }
    }

    async fn read_persisted(&self, path: &Path) -> Result<Option<Settings>, SettingsError> {
        let content = self.host.read_text(path).await?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let defaults = self.resolved_defaults().await;
        Settings::from_json_over(defaults, &content)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn apply_defaults(&self) {
        let defaults = self.resolved_defaults().await;
        self.state().settings = defaults.clone();
        self.persist(&defaults).await;
    }

    /// What the defaults would be right now. Touches neither memory nor disk.
    pub async fn resolved_defaults(&self) -> Settings {
        match self.host.home_dir().await {
            Ok(home) => Settings::defaults_for_home(&home),
            Err(e) => {
                tracing::warn!("Failed to get home directory, using fallback paths: {e}");
                Settings::fallback_defaults()
            }
        }
    }

    pub async fn update_replay_path(&self, path: impl Into<String>) {
        let _saving = SavingGuard::raise(self, SavingField::ReplayPath);
        let snapshot = {
            let mut state = self.state();
            state.settings.replay_download_path = path.into();
            state.settings.clone()
        };
        self.persist(&snapshot).await;
    }

    pub async fn update_map_path(&self, path: impl Into<String>) {
        let _saving = SavingGuard::raise(self, SavingField::MapPath);
        let snapshot = {
            let mut state = self.state();
            state.settings.map_download_path = path.into();
            state.settings.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Merge any subset of fields and persist. Raises no saving flag.
    pub async fn update_settings(&self, patch: SettingsPatch) {
        let snapshot = {
            let mut state = self.state();
            let current = std::mem::take(&mut state.settings);
            state.settings = current.merged(patch);
            state.settings.clone()
        };
        self.persist(&snapshot).await;
    }

    pub async fn reset_to_defaults(&self) {
        tracing::info!("Resetting settings to defaults");
        self.apply_defaults().await;
    }

    async fn persist(&self, settings: &Settings) {
        if let Err(e) = self.try_persist(settings).await {
            tracing::error!("Failed to save settings: {e}");
        }
    }

    async fn try_persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        let path = self.settings_file().ok_or_else(|| SettingsError::PathResolution {
            what: "settings file",
            reason: "app data directory is unknown".to_string(),
        })?;
        let content = settings.to_json().map_err(SettingsError::Encode)?;
        self.host.write_text(&path, &content).await?;
        tracing::debug!("Settings saved to {}", path.display());
        Ok(())
    }
}
