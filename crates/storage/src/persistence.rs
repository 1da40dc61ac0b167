//! Versioned file persistence
//!
//! Session state survives app restarts through a single JSON file. Writes go
//! through a temp-file rename so a crash mid-write never leaves a torn file,
//! and each write carries a checksum so corruption is detected on load rather
//! than surfacing later as mysteriously wrong session data.

use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Persistence error types
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// State not initialized
    #[error("State not initialized")]
    NotInitialized,

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// On-disk envelope around the persisted payload
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct VersionedState<T> {
    version: u32,
    checksum: String,
    data: T,
}

impl<T: Serialize> VersionedState<T> {
    fn new(version: u32, data: T) -> Result<Self> {
        let payload = serde_json::to_string(&data)?;
        let checksum = format!("{:x}", md5::compute(&payload));

        Ok(Self { version, checksum, data })
    }

    fn verify_checksum(&self) -> Result<()> {
        let payload = serde_json::to_string(&self.data)?;
        let computed = format!("{:x}", md5::compute(&payload));

        if computed != self.checksum {
            return Err(PersistenceError::Corruption(format!(
                "Checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }

        Ok(())
    }
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Path to the persistence file
    pub path: PathBuf,
    /// Current schema version
    pub version: u32,
    /// Enable atomic writes with temp files
    pub atomic_writes: bool,
    /// Enable automatic backups
    pub auto_backup: bool,
    /// Number of backups to keep
    pub backup_count: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.json"),
            version: 1,
            atomic_writes: true,
            auto_backup: true,
            backup_count: 3,
        }
    }
}

impl PersistenceConfig {
    /// Create a new configuration
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set schema version
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Enable or disable atomic writes
    pub fn atomic_writes(mut self, enabled: bool) -> Self {
        self.atomic_writes = enabled;
        self
    }

    /// Configure backups
    pub fn backups(mut self, enabled: bool, count: usize) -> Self {
        self.auto_backup = enabled;
        self.backup_count = count;
        self
    }
}

/// Persisted state manager
///
/// Holds an in-memory copy of the state and mirrors every change to disk.
/// A missing file on `init` is not an error; the state starts from
/// `T::default()` and the file appears on the first write.
pub struct PersistedState<T> {
    config: PersistenceConfig,
    state: Arc<RwLock<Option<T>>>,
}

impl<T> PersistedState<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Create a new persisted state manager
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Initialize by loading from disk
    pub async fn init(&self) -> Result<()> {
        match self.load_from_disk().await {
            Ok(data) => {
                let mut state = self.state.write().await;
                *state = Some(data);
                Ok(())
            }
            Err(PersistenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut state = self.state.write().await;
                *state = Some(T::default());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Get the current state
    pub async fn get(&self) -> Result<T> {
        let state = self.state.read().await;
        state.clone().ok_or(PersistenceError::NotInitialized)
    }

    /// Update the state and persist to disk
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let mut state = self.state.write().await;

        match state.as_mut() {
            Some(current) => {
                f(current);
                self.write_to_disk(current).await
            }
            None => Err(PersistenceError::NotInitialized),
        }
    }

    /// Set the entire state and persist
    pub async fn set(&self, new_state: T) -> Result<()> {
        let mut state = self.state.write().await;
        *state = Some(new_state.clone());
        self.write_to_disk(&new_state).await
    }

    /// Reset to the default state and remove the file
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = Some(T::default());

        if self.config.path.exists() {
            fs::remove_file(&self.config.path).await?;
        }

        Ok(())
    }

    async fn load_from_disk(&self) -> Result<T> {
        let contents = fs::read_to_string(&self.config.path).await?;

        let versioned: VersionedState<T> = serde_json::from_str(&contents)?;
        versioned.verify_checksum()?;

        if versioned.version != self.config.version {
            return Err(PersistenceError::VersionMismatch {
                expected: self.config.version,
                found: versioned.version,
            });
        }

        Ok(versioned.data)
    }

    async fn write_to_disk(&self, data: &T) -> Result<()> {
        let versioned = VersionedState::new(self.config.version, data.clone())?;
        let json = serde_json::to_string_pretty(&versioned)?;

        if self.config.atomic_writes {
            self.write_atomic(&json).await?;
        } else {
            fs::write(&self.config.path, json).await?;
        }

        if self.config.auto_backup {
            if let Err(e) = self.create_backup().await {
                tracing::warn!("State backup failed: {}", e);
            }
        }

        Ok(())
    }

    /// Write via temp file + rename
    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let temp_path = self.config.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.config.path).await?;

        Ok(())
    }

    /// Rotate numbered backups, newest is `.backup.1`
    async fn create_backup(&self) -> Result<()> {
        if !self.config.path.exists() {
            return Ok(());
        }

        for i in (1..self.config.backup_count).rev() {
            let from = self.backup_path(i);
            let to = self.backup_path(i + 1);

            if from.exists() {
                let _ = fs::rename(&from, &to).await;
            }
        }

        let backup_path = self.backup_path(1);
        let _ = fs::copy(&self.config.path, &backup_path).await;

        Ok(())
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut path = self.config.path.clone();
        let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        path.set_file_name(format!("{}.backup.{}", filename, n));
        path
    }

    /// Restore from a numbered backup
    pub async fn restore_from_backup(&self, backup_number: usize) -> Result<()> {
        let backup_path = self.backup_path(backup_number);

        if !backup_path.exists() {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Backup not found",
            )));
        }

        fs::copy(&backup_path, &self.config.path).await?;
        self.init().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
    struct TestState {
        counter: i32,
        name: String,
    }

    fn test_config(dir: &TempDir, file: &str) -> PersistenceConfig {
        PersistenceConfig::new(dir.path().join(file))
    }

    #[tokio::test]
    async fn test_init_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let state: PersistedState<TestState> = PersistedState::new(test_config(&dir, "s.json"));

        state.init().await.unwrap();

        assert_eq!(state.get().await.unwrap(), TestState::default());
    }

    #[tokio::test]
    async fn test_get_before_init() {
        let dir = TempDir::new().unwrap();
        let state: PersistedState<TestState> = PersistedState::new(test_config(&dir, "s.json"));

        let result = state.get().await;
        assert!(matches!(result, Err(PersistenceError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_update_persists() {
        let dir = TempDir::new().unwrap();
        let state: PersistedState<TestState> = PersistedState::new(test_config(&dir, "s.json"));

        state.init().await.unwrap();
        state
            .update(|s| {
                s.counter = 42;
                s.name = "test".to_string();
            })
            .await
            .unwrap();

        let current = state.get().await.unwrap();
        assert_eq!(current.counter, 42);
        assert_eq!(current.name, "test");
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "s.json");

        {
            let state: PersistedState<TestState> = PersistedState::new(config.clone());
            state.init().await.unwrap();
            state
                .update(|s| {
                    s.counter = 99;
                    s.name = "persisted".to_string();
                })
                .await
                .unwrap();
        }

        let state: PersistedState<TestState> = PersistedState::new(config);
        state.init().await.unwrap();

        let current = state.get().await.unwrap();
        assert_eq!(current.counter, 99);
        assert_eq!(current.name, "persisted");
    }

    #[tokio::test]
    async fn test_corruption_detection() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "s.json");

        let state: PersistedState<TestState> = PersistedState::new(config.clone());
        state.init().await.unwrap();
        state.update(|s| s.counter = 42).await.unwrap();

        // Tamper with the payload without fixing the checksum
        let contents = fs::read_to_string(&config.path).await.unwrap();
        fs::write(&config.path, contents.replace("42", "99")).await.unwrap();

        let reloaded: PersistedState<TestState> = PersistedState::new(config);
        let result = reloaded.init().await;
        assert!(matches!(result, Err(PersistenceError::Corruption(_))));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.json");

        {
            let config = PersistenceConfig::new(&path).version(1);
            let state: PersistedState<TestState> = PersistedState::new(config);
            state.init().await.unwrap();
            state.update(|s| s.counter = 1).await.unwrap();
        }

        let config = PersistenceConfig::new(&path).version(2);
        let state: PersistedState<TestState> = PersistedState::new(config);
        let result = state.init().await;
        assert!(matches!(
            result,
            Err(PersistenceError::VersionMismatch { expected: 2, found: 1 })
        ));
    }

    #[tokio::test]
    async fn test_backup_rotation_and_restore() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "s.json").backups(true, 2);

        let state: PersistedState<TestState> = PersistedState::new(config);
        state.init().await.unwrap();

        for i in 1..=3 {
            state.update(|s| s.counter = i).await.unwrap();
        }

        // backup.2 holds the state from two writes ago
        state.restore_from_backup(2).await.unwrap();
        assert_eq!(state.get().await.unwrap().counter, 2);
    }

    #[tokio::test]
    async fn test_atomic_write_cleans_temp_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "s.json").atomic_writes(true);
        let temp_path = config.path.with_extension("tmp");

        let state: PersistedState<TestState> = PersistedState::new(config);
        state.init().await.unwrap();
        state.update(|s| s.counter = 123).await.unwrap();

        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "s.json");
        let path = config.path.clone();

        let state: PersistedState<TestState> = PersistedState::new(config);
        state.init().await.unwrap();
        state.update(|s| s.counter = 7).await.unwrap();
        assert!(path.exists());

        state.clear().await.unwrap();
        assert!(!path.exists());
        assert_eq!(state.get().await.unwrap(), TestState::default());
    }
}
