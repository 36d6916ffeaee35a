//! Recording address-usage port.

use parking_lot::Mutex;
use shared_types::Address;

use crate::ports::AddressUsage;

/// Records every `set_address_use` call in order.
#[derive(Debug, Default)]
pub struct RecordingAddressUsage {
    calls: Mutex<Vec<(Address, bool)>>,
}

impl RecordingAddressUsage {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all calls made so far.
    pub fn take(&self) -> Vec<(Address, bool)> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Addresses currently marked in use, in the order they were marked.
    pub fn in_use(&self) -> Vec<Address> {
        let mut active: Vec<Address> = Vec::new();
        for (address, used) in self.calls.lock().iter() {
            if *used {
                if !active.contains(address) {
                    active.push(address.clone());
                }
            } else {
                active.retain(|a| a != address);
            }
        }
        active
    }
}

impl AddressUsage for RecordingAddressUsage {
    fn set_address_use(&self, address: &Address, in_use: bool) {
        self.calls.lock().push((address.clone(), in_use));
    }
}
