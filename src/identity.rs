use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use rand::{rngs::OsRng, RngCore};
use tokio::sync::Mutex;

use crate::db::Database;

const DEVICE_ID_KEY: &str = "device_id";
const DEVICE_ID_PREFIX: &str = "dev_";
const RANDOM_BYTES: usize = 6;
const ID_HEX_CHARS: usize = 6;

/// A single durable key-value slot holding the device identifier.
#[async_trait]
pub trait IdentitySlot: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn store(&self, value: &str) -> Result<()>;
}

#[async_trait]
impl IdentitySlot for Database {
    async fn load(&self) -> Result<Option<String>> {
        self.get_value(DEVICE_ID_KEY).await
    }

    async fn store(&self, value: &str) -> Result<()> {
        self.put_value(DEVICE_ID_KEY, value).await
    }
}

/// Lazily creates and remembers the per-installation device identifier.
///
/// The first successful lookup is cached for the process, so the slot is read
/// at most once when it works. When the slot fails, a timestamp-derived id is
/// used for this process only and nothing is written.
pub struct DeviceIdentityStore {
    slot: Arc<dyn IdentitySlot>,
    cached: Mutex<Option<String>>,
}

impl DeviceIdentityStore {
    pub fn new(slot: Arc<dyn IdentitySlot>) -> Self {
        Self {
            slot,
            cached: Mutex::new(None),
        }
    }

    pub async fn device_id(&self) -> String {
        // Held across the slot I/O so two first callers can't mint two ids.
        let mut cached = self.cached.lock().await;
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = self.load_or_create().await;
        *cached = Some(id.clone());
        id
    }

    async fn load_or_create(&self) -> String {
        match self.slot.load().await {
            Ok(Some(existing)) if !existing.is_empty() => return existing,
            Ok(_) => {}
            Err(err) => {
                warn!("Device id storage unreadable, using process-only id: {err:#}");
                return ephemeral_device_id();
            }
        }

        let fresh = generate_device_id();
        match self.slot.store(&fresh).await {
            Ok(()) => {
                info!("Generated device id {fresh}");
                fresh
            }
            Err(err) => {
                warn!("Failed to persist device id, using process-only id: {err:#}");
                ephemeral_device_id()
            }
        }
    }
}

fn generate_device_id() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{DEVICE_ID_PREFIX}{}", &hex[..ID_HEX_CHARS])
}

fn ephemeral_device_id() -> String {
    format!("{DEVICE_ID_PREFIX}tmp_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemorySlot {
        value: std::sync::Mutex<Option<String>>,
        loads: AtomicUsize,
        stores: AtomicUsize,
    }

    #[async_trait]
    impl IdentitySlot for MemorySlot {
        async fn load(&self) -> Result<Option<String>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.lock().unwrap().clone())
        }

        async fn store(&self, value: &str) -> Result<()> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            *self.value.lock().unwrap() = Some(value.to_string());
            Ok(())
        }
    }

    struct BrokenSlot;

    #[async_trait]
    impl IdentitySlot for BrokenSlot {
        async fn load(&self) -> Result<Option<String>> {
            Err(anyhow!("disk unavailable"))
        }

        async fn store(&self, _value: &str) -> Result<()> {
            Err(anyhow!("disk unavailable"))
        }
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_device_id();
        assert!(id.starts_with(DEVICE_ID_PREFIX));
        let suffix = &id[DEVICE_ID_PREFIX.len()..];
        assert_eq!(suffix.len(), ID_HEX_CHARS);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_repeated_calls_return_same_id() {
        let slot = Arc::new(MemorySlot::default());
        let store = DeviceIdentityStore::new(slot.clone());

        let first = store.device_id().await;
        for _ in 0..5 {
            assert_eq!(store.device_id().await, first);
        }
        assert_eq!(slot.loads.load(Ordering::SeqCst), 1);
        assert_eq!(slot.stores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_id_is_reused() {
        let slot = Arc::new(MemorySlot::default());
        *slot.value.lock().unwrap() = Some("dev_c0ffee".into());

        let store = DeviceIdentityStore::new(slot.clone());
        assert_eq!(store.device_id().await, "dev_c0ffee");
        assert_eq!(slot.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_id_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");

        let first = {
            let db = Database::new(path.clone()).unwrap();
            DeviceIdentityStore::new(Arc::new(db)).device_id().await
        };

        let db = Database::new(path).unwrap();
        let second = DeviceIdentityStore::new(Arc::new(db)).device_id().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_broken_storage_falls_back_for_process() {
        let store = DeviceIdentityStore::new(Arc::new(BrokenSlot));
        let id = store.device_id().await;
        assert!(id.starts_with("dev_tmp_"));
        assert_eq!(store.device_id().await, id);
    }
}
