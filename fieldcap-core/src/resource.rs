//! Resource accounting for field capture
//!
//! Hardware streams, preview URLs and timers are scarce resources that the
//! platform does not reclaim on its own while the application lives. Every
//! acquisition goes through a [`ResourceLedger`] and is represented by a
//! [`ResourceLease`] that gives the slot back when dropped.

use crate::error::{FieldCapError, FieldCapResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Kinds of resources tracked by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A live camera/microphone stream
    DeviceHandle,
    /// A transient preview URL backed by an in-memory blob
    PreviewUrl,
    /// A repeating timer (recording countdown, location polling)
    Timer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::DeviceHandle => write!(f, "device handle"),
            ResourceKind::PreviewUrl => write!(f, "preview url"),
            ResourceKind::Timer => write!(f, "timer"),
        }
    }
}

/// Resource limits configuration
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum simultaneously live device handles (None = unlimited)
    pub max_device_handles: Option<u32>,
    /// Maximum simultaneously live preview URLs (None = unlimited)
    pub max_preview_urls: Option<u32>,
    /// Maximum simultaneously running timers (None = unlimited)
    pub max_timers: Option<u32>,
}

impl ResourceLimits {
    /// One physical camera shared by the whole application
    pub fn single_camera() -> Self {
        Self {
            max_device_handles: Some(1),
            max_preview_urls: Some(8),
            max_timers: Some(8),
        }
    }

    /// Unlimited resources (for testing)
    pub fn unlimited() -> Self {
        Self {
            max_device_handles: None,
            max_preview_urls: None,
            max_timers: None,
        }
    }

    fn limit_for(&self, kind: ResourceKind) -> Option<u32> {
        match kind {
            ResourceKind::DeviceHandle => self.max_device_handles,
            ResourceKind::PreviewUrl => self.max_preview_urls,
            ResourceKind::Timer => self.max_timers,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::single_camera()
    }
}

/// Counters for one resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCount {
    /// Currently live
    pub live: u32,
    /// Highest number ever live at the same time
    pub peak: u32,
    /// Total acquisitions since the ledger was created
    pub acquired_total: u64,
}

/// Snapshot of resource usage
#[derive(Debug, Clone)]
pub struct ResourceUsage {
    /// Device handle counters
    pub device_handles: ResourceCount,
    /// Preview URL counters
    pub preview_urls: ResourceCount,
    /// Timer counters
    pub timers: ResourceCount,
    /// When the snapshot was taken
    pub measured_at: Instant,
}

impl ResourceUsage {
    /// Whether nothing is held any more
    pub fn is_quiescent(&self) -> bool {
        self.device_handles.live == 0 && self.preview_urls.live == 0 && self.timers.live == 0
    }
}

#[derive(Debug)]
struct LedgerInner {
    limits: ResourceLimits,
    counts: Mutex<HashMap<ResourceKind, ResourceCount>>,
}

impl LedgerInner {
    fn release(&self, kind: ResourceKind, id: Uuid) {
        let mut counts = self.counts.lock();
        let count = counts.entry(kind).or_default();
        if count.live == 0 {
            warn!("Release of {} {} with no live lease", kind, id);
            return;
        }
        count.live -= 1;
        debug!("Released {} {} ({} live)", kind, id, count.live);
    }
}

/// Shared ledger of live resources
///
/// Cloning is cheap; all clones observe the same counters.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    inner: Arc<LedgerInner>,
}

impl ResourceLedger {
    /// Create a ledger with the given limits
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                limits,
                counts: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Ledger without limits
    pub fn unlimited() -> Self {
        Self::new(ResourceLimits::unlimited())
    }

    /// Acquire one unit of `kind`
    ///
    /// Fails with [`FieldCapError::ResourceLimit`] if the limit is reached.
    pub fn acquire(&self, kind: ResourceKind) -> FieldCapResult<ResourceLease> {
        let mut counts = self.inner.counts.lock();
        let count = counts.entry(kind).or_default();

        if let Some(limit) = self.inner.limits.limit_for(kind) {
            if count.live >= limit {
                return Err(FieldCapError::ResourceLimit {
                    resource: format!("{} ({} of {} in use)", kind, count.live, limit),
                });
            }
        }

        count.live += 1;
        count.peak = count.peak.max(count.live);
        count.acquired_total += 1;

        let id = Uuid::new_v4();
        debug!("Acquired {} {} ({} live)", kind, id, count.live);

        Ok(ResourceLease {
            ledger: self.inner.clone(),
            kind,
            id,
            released: false,
        })
    }

    /// Counters for one kind
    pub fn count(&self, kind: ResourceKind) -> ResourceCount {
        self.inner
            .counts
            .lock()
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    /// Number of live units of `kind`
    pub fn live(&self, kind: ResourceKind) -> u32 {
        self.count(kind).live
    }

    /// Highest number of simultaneously live units of `kind`
    pub fn peak(&self, kind: ResourceKind) -> u32 {
        self.count(kind).peak
    }

    /// Snapshot of all counters
    pub fn usage(&self) -> ResourceUsage {
        ResourceUsage {
            device_handles: self.count(ResourceKind::DeviceHandle),
            preview_urls: self.count(ResourceKind::PreviewUrl),
            timers: self.count(ResourceKind::Timer),
            measured_at: Instant::now(),
        }
    }

    /// Configured limits
    pub fn limits(&self) -> &ResourceLimits {
        &self.inner.limits
    }
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(ResourceLimits::default())
    }
}

/// One acquired unit; returned to the ledger on drop
#[derive(Debug)]
pub struct ResourceLease {
    ledger: Arc<LedgerInner>,
    kind: ResourceKind,
    id: Uuid,
    released: bool,
}

impl ResourceLease {
    /// Lease id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Kind of resource held
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Give the unit back now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.ledger.release(self.kind, self.id);
        }
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_limits_presets() {
        let single = ResourceLimits::single_camera();
        assert_eq!(single.max_device_handles, Some(1));

        let unlimited = ResourceLimits::unlimited();
        assert!(unlimited.max_device_handles.is_none());
        assert!(unlimited.max_preview_urls.is_none());
        assert!(unlimited.max_timers.is_none());
    }

    #[test]
    fn test_lease_released_on_drop() {
        let ledger = ResourceLedger::default();

        let lease = ledger.acquire(ResourceKind::DeviceHandle).unwrap();
        assert_eq!(ledger.live(ResourceKind::DeviceHandle), 1);
        assert_eq!(lease.kind(), ResourceKind::DeviceHandle);

        drop(lease);
        assert_eq!(ledger.live(ResourceKind::DeviceHandle), 0);
        assert_eq!(ledger.peak(ResourceKind::DeviceHandle), 1);
    }

    #[test]
    fn test_device_limit_enforced() {
        let ledger = ResourceLedger::default();

        let first = ledger.acquire(ResourceKind::DeviceHandle).unwrap();
        let second = ledger.acquire(ResourceKind::DeviceHandle);
        assert!(matches!(second, Err(FieldCapError::ResourceLimit { .. })));

        first.release();
        let third = ledger.acquire(ResourceKind::DeviceHandle);
        assert!(third.is_ok());
        assert_eq!(ledger.count(ResourceKind::DeviceHandle).acquired_total, 2);
    }

    #[test]
    fn test_usage_snapshot() {
        let ledger = ResourceLedger::unlimited();
        let _timer = ledger.acquire(ResourceKind::Timer).unwrap();
        let _preview = ledger.acquire(ResourceKind::PreviewUrl).unwrap();

        let usage = ledger.usage();
        assert_eq!(usage.timers.live, 1);
        assert_eq!(usage.preview_urls.live, 1);
        assert_eq!(usage.device_handles.live, 0);
        assert!(!usage.is_quiescent());
    }
}
