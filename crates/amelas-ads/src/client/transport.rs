// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract ADS transport layer.
//!
//! This module defines the [`AdsTransport`] trait: the field-bus capability
//! the client is layered on. The crate ships no wire implementation; an
//! application plugs in a transport backed by a TwinCAT router, an AMS/TCP
//! stack, or a test double.
//!
//! Transports report failures as the raw [`AdsReturnCode`] the device
//! returned. The client attaches symbol context and maps them to
//! [`AdsError`](crate::error::AdsError) variants.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AdsReturnCode;
use crate::types::{AmsAddr, NotificationAttributes, NotificationHandle, SymbolHandle};

/// Result of a single transport call.
pub type TransportResult<T> = Result<T, AdsReturnCode>;

// =============================================================================
// Notification
// =============================================================================

/// A change notification delivered by the device.
#[derive(Clone, PartialEq, Eq)]
pub struct Notification {
    /// Registration the notification belongs to.
    pub handle: NotificationHandle,
    /// Device timestamp of the sample.
    pub timestamp: DateTime<Utc>,
    /// Raw value bytes.
    pub data: Vec<u8>,
}

impl Notification {
    /// Creates a notification stamped with the current time.
    pub fn new(handle: NotificationHandle, data: impl Into<Vec<u8>>) -> Self {
        Self {
            handle,
            timestamp: Utc::now(),
            data: data.into(),
        }
    }

    /// Sets the device timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("handle", &self.handle)
            .field("timestamp", &self.timestamp)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Receiver of device-originated notifications.
///
/// A transport keeps the sink it was given in
/// [`AdsTransport::add_notification`] and calls [`deliver`](Self::deliver)
/// from whatever thread its receive path runs on, possibly concurrently with
/// other deliveries and with foreground calls on the client.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    fn deliver(&self, notification: Notification);
}

// =============================================================================
// AdsTransport Trait
// =============================================================================

/// Field-bus capability used by [`AdsClient`](super::AdsClient).
///
/// Each method is a single round trip to the device. Implementations must
/// not retry internally; a nonzero return code is reported as `Err`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The client serializes calls through
/// a mutex, so no two methods run concurrently on one transport.
#[async_trait]
pub trait AdsTransport: Send + Sync {
    // =========================================================================
    // Session
    // =========================================================================

    /// Opens a session to `target`.
    async fn open(&mut self, target: AmsAddr) -> TransportResult<()>;

    /// Closes the session.
    async fn close(&mut self) -> TransportResult<()>;

    // =========================================================================
    // Symbols
    // =========================================================================

    /// Resolves a symbol name to a device handle.
    async fn resolve_handle(&self, symbol: &str) -> TransportResult<SymbolHandle>;

    /// Releases a device handle obtained from [`resolve_handle`](Self::resolve_handle).
    async fn release_handle(&self, handle: SymbolHandle) -> TransportResult<()>;

    /// Reads exactly `len` bytes from the symbol behind `handle`.
    async fn read(&self, handle: SymbolHandle, len: usize) -> TransportResult<Vec<u8>>;

    /// Writes `data` to the symbol behind `handle`.
    async fn write(&self, handle: SymbolHandle, data: &[u8]) -> TransportResult<()>;

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Registers a change notification on `handle`.
    ///
    /// Notifications for the returned handle are passed to `sink`.
    async fn add_notification(
        &self,
        handle: SymbolHandle,
        attributes: NotificationAttributes,
        sink: Arc<dyn NotificationSink>,
    ) -> TransportResult<NotificationHandle>;

    /// Cancels a change notification.
    async fn delete_notification(&self, handle: NotificationHandle) -> TransportResult<()>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a display name for this transport.
    fn display_name(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Collect(Mutex<Vec<Notification>>);

    impl NotificationSink for Collect {
        fn deliver(&self, notification: Notification) {
            self.0.lock().push(notification);
        }
    }

    #[test]
    fn test_sink_is_object_safe() {
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let sink: Arc<dyn NotificationSink> = collect.clone();
        sink.deliver(Notification::new(NotificationHandle(3), vec![1u8]));
        assert_eq!(collect.0.lock().len(), 1);
        assert_eq!(collect.0.lock()[0].handle, NotificationHandle(3));
    }

    #[test]
    fn test_notification_debug_hides_payload() {
        let n = Notification::new(NotificationHandle(1), vec![0u8; 64]);
        let text = format!("{n:?}");
        assert!(text.contains("len: 64"));
    }
}
