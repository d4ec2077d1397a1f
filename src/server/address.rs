//! Bind address resolution.

/// Supplies the hostname the container binds to and advertises.
pub trait AddressResolver: Send + Sync {
    fn hostname(&self) -> String;
}

/// Returns a fixed, configured hostname. No network discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredAddressResolver {
    hostname: String,
}

impl ConfiguredAddressResolver {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl AddressResolver for ConfiguredAddressResolver {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }
}
