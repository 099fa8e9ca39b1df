//! Transient preview URLs
//!
//! A preview URL points at an in-memory blob for as long as it is live.
//! Nothing revokes it automatically, so owners keep the current URL in a
//! [`PreviewSlot`] which revokes the old one whenever it is replaced,
//! cleared or dropped.

use crate::error::FieldCapResult;
use crate::resource::{ResourceKind, ResourceLease, ResourceLedger};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const PREVIEW_SCHEME: &str = "blob:fieldcap/";

/// Opaque preview URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    /// URL as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct PreviewEntry {
    data: Bytes,
    mime_type: String,
    created_at: DateTime<Utc>,
    _lease: ResourceLease,
}

/// Blob resolved from a live preview URL
#[derive(Debug, Clone)]
pub struct PreviewBlob {
    /// Payload
    pub data: Bytes,
    /// MIME type of the payload
    pub mime_type: String,
    /// When the URL was created
    pub created_at: DateTime<Utc>,
}

/// Registry of live preview URLs
#[derive(Debug, Clone)]
pub struct PreviewRegistry {
    entries: Arc<DashMap<String, PreviewEntry>>,
    ledger: ResourceLedger,
}

impl PreviewRegistry {
    /// Create a registry accounting into `ledger`
    pub fn new(ledger: ResourceLedger) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ledger,
        }
    }

    /// Create a new URL for `data`
    pub fn create(&self, data: Bytes, mime_type: &str) -> FieldCapResult<PreviewUrl> {
        let lease = self.ledger.acquire(ResourceKind::PreviewUrl)?;
        let url = format!("{}{}", PREVIEW_SCHEME, Uuid::new_v4());

        debug!("Created preview {} ({} bytes, {})", url, data.len(), mime_type);
        self.entries.insert(
            url.clone(),
            PreviewEntry {
                data,
                mime_type: mime_type.to_string(),
                created_at: Utc::now(),
                _lease: lease,
            },
        );

        Ok(PreviewUrl(url))
    }

    /// Look up the blob behind a live URL
    pub fn resolve(&self, url: &PreviewUrl) -> Option<PreviewBlob> {
        self.entries.get(url.as_str()).map(|entry| PreviewBlob {
            data: entry.data.clone(),
            mime_type: entry.mime_type.clone(),
            created_at: entry.created_at,
        })
    }

    /// Revoke a URL; returns false if it was not live
    pub fn revoke(&self, url: &PreviewUrl) -> bool {
        let removed = self.entries.remove(url.as_str()).is_some();
        if removed {
            debug!("Revoked preview {}", url);
        }
        removed
    }

    /// Whether a URL is still live
    pub fn is_live(&self, url: &PreviewUrl) -> bool {
        self.entries.contains_key(url.as_str())
    }

    /// Number of live URLs
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }
}

/// Holder of at most one live preview URL
#[derive(Debug)]
pub struct PreviewSlot {
    registry: PreviewRegistry,
    current: Option<PreviewUrl>,
}

impl PreviewSlot {
    /// Empty slot backed by `registry`
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    /// Revoke the current URL (if any) and create a new one for `data`
    pub fn replace(&mut self, data: Bytes, mime_type: &str) -> FieldCapResult<PreviewUrl> {
        self.clear();
        let url = self.registry.create(data, mime_type)?;
        self.current = Some(url.clone());
        Ok(url)
    }

    /// Revoke the current URL
    pub fn clear(&mut self) {
        if let Some(url) = self.current.take() {
            self.registry.revoke(&url);
        }
    }

    /// Current URL
    pub fn current(&self) -> Option<&PreviewUrl> {
        self.current.as_ref()
    }
}

impl Drop for PreviewSlot {
    fn drop(&mut self) {
        self.clear();
    }
}
