//! Distributed-mode multicast discovery — hook surface only (Open Question 2:
//! no bundled implementation, not wired into `hydrogen-server` by default).

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAnnouncement {
    pub device_id: String,
    pub address: String,
    pub protocols: Vec<String>,
}

#[async_trait]
pub trait DiscoveryHook: Send + Sync {
    async fn discover(&self) -> Vec<DeviceAnnouncement>;
}
