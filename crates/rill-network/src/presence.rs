//! The concrete [`Presence`] adapter: a `dashmap`-backed registry of
//! per-address device/last-seen entries, updated as `KeepAlive`
//! advertisements are reconciled and answered.

use dashmap::DashMap;

use rill_core::address::Address;
use rill_core::adapters::{Presence, PresenceEntry, PresenceInfo};

/// In-memory, concurrent presence registry keyed by wallet address.
#[derive(Default)]
pub struct PresenceRegistry {
    by_address: DashMap<Address, PresenceInfo>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self { by_address: DashMap::new() }
    }

    /// Record (or refresh) a device's last-seen time for an address.
    /// Updates the existing entry for the device if one exists, otherwise
    /// appends a new one.
    pub fn record_keep_alive(&self, addr: Address, device: Vec<u8>, last_seen: i64) {
        let mut info = self.by_address.entry(addr).or_default();
        match info.addresses.iter_mut().find(|e| e.device == device) {
            Some(entry) => entry.last_seen_time = last_seen,
            None => info.addresses.push(PresenceEntry { device, last_seen_time: last_seen }),
        }
    }

    /// Drop all presence tracking for an address.
    pub fn remove(&self, addr: &Address) {
        self.by_address.remove(addr);
    }
}

impl Presence for PresenceRegistry {
    fn by_address(&self, addr: &Address) -> Option<PresenceInfo> {
        self.by_address.get(addr).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 4]).unwrap()
    }

    #[test]
    fn unknown_address_has_no_presence() {
        let reg = PresenceRegistry::new();
        assert!(reg.by_address(&addr(1)).is_none());
    }

    #[test]
    fn keep_alive_creates_presence() {
        let reg = PresenceRegistry::new();
        reg.record_keep_alive(addr(1), b"phone".to_vec(), 100);
        let info = reg.by_address(&addr(1)).unwrap();
        assert_eq!(info.addresses.len(), 1);
        assert_eq!(info.addresses[0].last_seen_time, 100);
    }

    #[test]
    fn repeated_keep_alive_updates_existing_device() {
        let reg = PresenceRegistry::new();
        reg.record_keep_alive(addr(1), b"phone".to_vec(), 100);
        reg.record_keep_alive(addr(1), b"phone".to_vec(), 200);
        let info = reg.by_address(&addr(1)).unwrap();
        assert_eq!(info.addresses.len(), 1);
        assert_eq!(info.addresses[0].last_seen_time, 200);
    }

    #[test]
    fn distinct_devices_accumulate() {
        let reg = PresenceRegistry::new();
        reg.record_keep_alive(addr(1), b"phone".to_vec(), 100);
        reg.record_keep_alive(addr(1), b"laptop".to_vec(), 150);
        let info = reg.by_address(&addr(1)).unwrap();
        assert_eq!(info.addresses.len(), 2);
    }

    #[test]
    fn remove_clears_presence() {
        let reg = PresenceRegistry::new();
        reg.record_keep_alive(addr(1), b"phone".to_vec(), 100);
        reg.remove(&addr(1));
        assert!(reg.by_address(&addr(1)).is_none());
    }
}
