//! Device pool: the registry of known ADB devices.
//!
//! [`DevicePool`] maps device serials to [`AdbClient`] handles and tracks
//! the default device used when a tool call omits an explicit serial.
//!
//! ## Device resolution
//!
//! All tool handlers call [`DevicePool::get`] with an optional serial. If
//! omitted, the current default is substituted. `get` never scans — a
//! device is either already known (from [`DevicePool::scan`] or an explicit
//! TCP connect) or the caller gets `None` and reports "Device not found".
//!
//! ## Default device
//!
//! The first device discovered while no default is set becomes the default.
//! It is never changed automatically after that; removing the default
//! device clears the field without promoting another device.
//!
//! ## Locking
//!
//! One `RwLock` guards the map and the default field together, so readers
//! never observe a serial without its handle. Only bookkeeping runs under
//! the lock — command execution happens on cloned `Arc` handles with the
//! lock released.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::adb::AdbClient;

/// Mutable inner state protected by the pool lock.
struct PoolInner {
    clients: HashMap<String, Arc<AdbClient>>,
    default_serial: Option<String>,
}

/// Registry of connected Android devices.
pub struct DevicePool {
    inner: RwLock<PoolInner>,
    adb_path: String,
    discovery_timeout_secs: u64,
}

impl DevicePool {
    /// Create an empty pool. Devices appear on the first [`DevicePool::scan`]
    /// or explicit [`DevicePool::register`].
    pub fn new(adb_path: &str, discovery_timeout_secs: u64) -> Self {
        Self {
            inner: RwLock::new(PoolInner {
                clients: HashMap::new(),
                default_serial: None,
            }),
            adb_path: adb_path.to_string(),
            discovery_timeout_secs,
        }
    }

    /// Scan for connected devices and update the pool.
    ///
    /// New serials get a bound client; serials already in the pool keep
    /// their existing handle. Returns the full discovered list, not just
    /// the newly added serials. Devices that disappeared from adb are left
    /// in the pool — removal is always explicit.
    pub async fn scan(&self) -> Vec<String> {
        let discovery = AdbClient::unbound(&self.adb_path);
        let serials = discovery.list_devices(self.discovery_timeout_secs).await;

        self.absorb_scan(&serials).await;
        serials
    }

    /// Fold a discovery result into the pool (bookkeeping half of `scan`).
    async fn absorb_scan(&self, serials: &[String]) {
        let mut inner = self.inner.write().await;
        for serial in serials {
            if !inner.clients.contains_key(serial) {
                info!(serial = %serial, "device discovered");
                inner
                    .clients
                    .insert(serial.clone(), Arc::new(AdbClient::bound(&self.adb_path, serial)));
            }
        }
        if inner.default_serial.is_none() {
            if let Some(first) = serials.first() {
                info!(serial = %first, "default device set");
                inner.default_serial = Some(first.clone());
            }
        }
    }

    /// Add a single device to the pool (e.g. after `adb connect`).
    /// Becomes the default if no default is set. No-op if already known.
    pub async fn register(&self, serial: &str) {
        self.absorb_scan(&[serial.to_string()]).await;
    }

    /// Look up a device's client, substituting the default serial when
    /// `serial` is `None`. Returns `None` when the resolved serial is not
    /// in the pool — never triggers an implicit scan.
    pub async fn get(&self, serial: Option<&str>) -> Option<Arc<AdbClient>> {
        let inner = self.inner.read().await;
        let resolved = match serial {
            Some(s) => s,
            None => inner.default_serial.as_deref()?,
        };
        inner.clients.get(resolved).cloned()
    }

    /// Set the default device. Fails (returns `false`) if the serial is not
    /// currently in the pool.
    pub async fn set_default(&self, serial: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.clients.contains_key(serial) {
            inner.default_serial = Some(serial.to_string());
            true
        } else {
            debug!(serial = %serial, "set_default refused: unknown device");
            false
        }
    }

    /// The current default serial, if any.
    pub async fn default_serial(&self) -> Option<String> {
        self.inner.read().await.default_serial.clone()
    }

    /// Remove a device from the pool. If it was the default, the default is
    /// cleared — no other device is promoted.
    pub async fn remove(&self, serial: &str) {
        let mut inner = self.inner.write().await;
        if inner.clients.remove(serial).is_some() {
            info!(serial = %serial, "device removed");
        }
        if inner.default_serial.as_deref() == Some(serial) {
            inner.default_serial = None;
        }
    }

    /// All known serials, sorted.
    pub async fn known_serials(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut serials: Vec<String> = inner.clients.keys().cloned().collect();
        serials.sort();
        serials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> DevicePool {
        DevicePool::new("adb", 5)
    }

    #[tokio::test]
    async fn get_on_empty_pool_returns_none() {
        let pool = pool();
        assert!(pool.get(None).await.is_none());
        assert!(pool.get(Some("AAA111")).await.is_none());
    }

    #[tokio::test]
    async fn first_discovered_device_becomes_default() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into(), "BBB222".into()]).await;

        assert_eq!(pool.default_serial().await.as_deref(), Some("AAA111"));
        let client = pool.get(None).await.expect("default resolves");
        assert_eq!(client.serial(), Some("AAA111"));
    }

    #[tokio::test]
    async fn rescan_preserves_handle_identity() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into()]).await;
        let first = pool.get(Some("AAA111")).await.unwrap();

        pool.absorb_scan(&["AAA111".into()]).await;
        let second = pool.get(Some("AAA111")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.known_serials().await, vec!["AAA111"]);
    }

    #[tokio::test]
    async fn set_default_requires_known_device() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into(), "BBB222".into()]).await;

        assert!(!pool.set_default("CCC333").await);
        assert_eq!(pool.default_serial().await.as_deref(), Some("AAA111"));

        assert!(pool.set_default("BBB222").await);
        assert_eq!(pool.default_serial().await.as_deref(), Some("BBB222"));
    }

    #[tokio::test]
    async fn removing_default_clears_it_without_promotion() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into(), "BBB222".into()]).await;

        pool.remove("AAA111").await;
        assert_eq!(pool.default_serial().await, None);
        assert!(pool.get(None).await.is_none());
        // The other device is untouched and still reachable explicitly.
        assert!(pool.get(Some("BBB222")).await.is_some());
    }

    #[tokio::test]
    async fn removing_non_default_keeps_default() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into(), "BBB222".into()]).await;

        pool.remove("BBB222").await;
        assert_eq!(pool.default_serial().await.as_deref(), Some("AAA111"));
    }

    #[tokio::test]
    async fn default_survives_later_scans() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into()]).await;
        // A later scan listing another device first must not steal the default.
        pool.absorb_scan(&["BBB222".into(), "AAA111".into()]).await;
        assert_eq!(pool.default_serial().await.as_deref(), Some("AAA111"));
    }

    #[tokio::test]
    async fn end_to_end_default_lifecycle() {
        let pool = pool();
        pool.absorb_scan(&["AAA111".into(), "BBB222".into()]).await;
        assert_eq!(pool.get(None).await.unwrap().serial(), Some("AAA111"));

        assert!(pool.set_default("BBB222").await);
        assert_eq!(pool.get(None).await.unwrap().serial(), Some("BBB222"));

        pool.remove("BBB222").await;
        assert!(pool.get(None).await.is_none());
    }

    #[tokio::test]
    async fn register_adds_and_defaults_single_device() {
        let pool = pool();
        pool.register("192.168.1.50:5555").await;
        assert_eq!(
            pool.default_serial().await.as_deref(),
            Some("192.168.1.50:5555")
        );
    }
}
