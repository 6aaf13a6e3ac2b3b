use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Arc,
};

use super::BusinessSettings;
use crate::config::project_dirs;
use crate::error::{CostEngineerError, Result};

const STORAGE_KEY_PREFIX: &str = "electrician_business_settings_";
const GUEST_USER: &str = "guest";

/// Per-user key/value persistence for small JSON documents.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted in the platform data directory.
    pub fn platform_default() -> Result<Self> {
        let dirs = project_dirs().ok_or_else(|| {
            CostEngineerError::Storage("no home directory to store settings in".to_string())
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct keys
    /// never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file.push(char::from(byte));
            } else {
                file.push_str(&format!("%{byte:02X}"));
            }
        }
        self.root.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load/save contract for [`BusinessSettings`], keyed per user.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    pub fn storage_key(user_id: Option<&str>) -> String {
        let user = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(GUEST_USER);
        format!("{STORAGE_KEY_PREFIX}{user}")
    }

    /// Missing or unreadable settings fall back to defaults.
    pub fn load(&self, user_id: Option<&str>) -> BusinessSettings {
        let key = Self::storage_key(user_id);
        match self.store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(%key, "stored business settings are corrupt, using defaults: {e}");
                    BusinessSettings::default()
                }
            },
            Ok(None) => BusinessSettings::default(),
            Err(e) => {
                tracing::warn!(%key, "failed to read business settings: {e}");
                BusinessSettings::default()
            }
        }
    }

    pub fn save(&self, user_id: Option<&str>, settings: &BusinessSettings) -> Result<()> {
        let key = Self::storage_key(user_id);
        let payload = serde_json::to_string(settings)?;
        self.store.set(&key, &payload)?;
        tracing::info!(%key, "saved business settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn storage_key_defaults_to_guest() {
        assert_eq!(
            SettingsService::storage_key(None),
            "electrician_business_settings_guest"
        );
        assert_eq!(
            SettingsService::storage_key(Some("  ")),
            "electrician_business_settings_guest"
        );
        assert_eq!(
            SettingsService::storage_key(Some("u-42")),
            "electrician_business_settings_u-42"
        );
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = SettingsService::new(Arc::new(FileKeyValueStore::new(dir.path())));

        let mut settings = BusinessSettings::default();
        settings.labour_rates.electrician = 58.5;
        settings.job_costs.certification_fee = 120.0;
        service.save(Some("user-1"), &settings).expect("save");

        let reloaded = SettingsService::new(Arc::new(FileKeyValueStore::new(dir.path())));
        assert_eq!(reloaded.load(Some("user-1")), settings);
        assert_eq!(reloaded.load(None), BusinessSettings::default());
    }

    #[test]
    fn similar_user_ids_get_separate_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyValueStore::new(dir.path());
        let dotted = SettingsService::storage_key(Some("a.b"));
        let underscored = SettingsService::storage_key(Some("a_b"));
        store.set(&dotted, "A").expect("set");
        assert_eq!(store.get(&underscored).expect("get"), None);

        store.set(&underscored, "B").expect("set");
        assert_eq!(store.get(&dotted).expect("get").as_deref(), Some("A"));
        assert_eq!(store.get(&underscored).expect("get").as_deref(), Some("B"));
        assert!(dir
            .path()
            .join("electrician_business_settings_a%2Eb.json")
            .exists());
    }

    #[test]
    fn corrupt_document_loads_defaults() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(&SettingsService::storage_key(None), "{ broken")
            .expect("set");
        let service = SettingsService::new(store);
        assert_eq!(service.load(None), BusinessSettings::default());
    }

    #[test]
    fn last_write_wins() {
        let service = SettingsService::in_memory();
        let mut first = BusinessSettings::default();
        first.profit_targets.margin_percent = 10.0;
        let mut second = first.clone();
        second.profit_targets.margin_percent = 30.0;
        service.save(Some("a"), &first).expect("save");
        service.save(Some("a"), &second).expect("save");
        assert_eq!(service.load(Some("a")).profit_targets.margin_percent, 30.0);
    }
}
