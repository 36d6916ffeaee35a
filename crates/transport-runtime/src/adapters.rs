//! # Adapters
//!
//! Port implementations connecting the subsystems to each other and to the
//! host.

use shared_types::{Address, TimeSource, Timestamp};
use std::sync::Arc;

use tc_03_address_validation::{AddressValidationApi, AddressValidationService};
use tc_04_neighbours::AddressUsage;

/// Wall clock in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp::from_millis(millis)
    }
}

/// Neighbours tell validation which addresses they use.
pub struct ValidationUsageAdapter {
    validation: Arc<AddressValidationService>,
}

impl ValidationUsageAdapter {
    /// Adapter forwarding to `validation`.
    pub fn new(validation: Arc<AddressValidationService>) -> Self {
        Self { validation }
    }
}

impl AddressUsage for ValidationUsageAdapter {
    fn set_address_use(&self, address: &Address, in_use: bool) {
        self.validation.set_address_use(address, in_use);
    }
}
