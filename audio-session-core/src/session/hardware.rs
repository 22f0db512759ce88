//! Process-wide ownership of input devices.
//!
//! A session must hold a [`HardwareLease`] for its device while it runs.
//! The first lease on a device marks the point where the hardware is brought
//! up; dropping the lease tears it down and lets another session take over.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::SessionError;

static OWNERS: LazyLock<Mutex<HashMap<String, Uuid>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Ownership token for one input device. Released on drop.
#[derive(Debug)]
pub struct HardwareLease {
    device_id: String,
    holder: Uuid,
}

impl HardwareLease {
    /// Claim `device_id` for `holder`.
    ///
    /// Fails with `DeviceBusy` if a different holder owns the device.
    /// Re-acquiring by the current holder is rejected the same way, so a
    /// device can never have two live leases.
    pub fn acquire(device_id: &str, holder: Uuid) -> Result<Self, SessionError> {
        let mut owners = OWNERS.lock();
        if let Some(owner) = owners.get(device_id) {
            log::debug!("device {} already held by session {}", device_id, owner);
            return Err(SessionError::DeviceBusy {
                device_id: device_id.to_string(),
            });
        }
        owners.insert(device_id.to_string(), holder);
        log::debug!("hardware for device {} acquired by session {}", device_id, holder);
        Ok(Self {
            device_id: device_id.to_string(),
            holder,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// Whether any session currently holds `device_id`.
    pub fn is_held(device_id: &str) -> bool {
        OWNERS.lock().contains_key(device_id)
    }

    /// Number of devices currently held in this process.
    pub fn active_count() -> usize {
        OWNERS.lock().len()
    }
}

impl Drop for HardwareLease {
    fn drop(&mut self) {
        let mut owners = OWNERS.lock();
        if owners.get(&self.device_id) == Some(&self.holder) {
            owners.remove(&self.device_id);
            log::debug!(
                "hardware for device {} released by session {}",
                self.device_id,
                self.holder
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_device() -> String {
        format!("test-device-{}", Uuid::new_v4())
    }

    #[test]
    fn second_holder_is_rejected() {
        let device = unique_device();
        let first = HardwareLease::acquire(&device, Uuid::new_v4()).unwrap();

        let err = HardwareLease::acquire(&device, Uuid::new_v4()).unwrap_err();
        assert_eq!(err, SessionError::DeviceBusy { device_id: device.clone() });
        assert!(HardwareLease::is_held(&device));

        drop(first);
        assert!(!HardwareLease::is_held(&device));
        assert!(HardwareLease::acquire(&device, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn same_holder_cannot_double_acquire() {
        let device = unique_device();
        let holder = Uuid::new_v4();
        let lease = HardwareLease::acquire(&device, holder).unwrap();

        assert!(HardwareLease::acquire(&device, holder).is_err());
        assert_eq!(lease.holder(), holder);
        assert_eq!(lease.device_id(), device);
    }

    #[test]
    fn devices_are_independent() {
        let a = HardwareLease::acquire(&unique_device(), Uuid::new_v4()).unwrap();
        let b = HardwareLease::acquire(&unique_device(), Uuid::new_v4()).unwrap();

        assert!(HardwareLease::is_held(a.device_id()));
        assert!(HardwareLease::is_held(b.device_id()));
        assert!(HardwareLease::active_count() >= 2);
    }
}
