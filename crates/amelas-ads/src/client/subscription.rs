// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Change-notification registrations and dispatch.
//!
//! # Architecture
//!
//! ```text
//!   transport receive path (any thread)
//!                 │  Notification { handle, timestamp, data }
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   SubscriptionTable (NotificationSink)          │
//! │        RwLock<HashMap<NotificationHandle, Registration>>        │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │  decode with PlcValue, lock released
//!                 ▼
//!          user callback Fn(V)
//! ```
//!
//! The table is owned by one client instance and handed to the transport as
//! an `Arc<dyn NotificationSink>`. Callbacks never run under the table lock,
//! so a callback may unsubscribe, including itself.
//!
//! A device may send the first sample of a new notification before
//! `add_notification` has returned its handle. While a [`RegistrationWindow`]
//! is open, samples for unknown handles are parked (latest per handle) and
//! handed to the registration when it is inserted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::error::ConversionError;
use crate::types::{NotificationAttributes, NotificationHandle, SymbolHandle, TransmissionMode};
use crate::value::PlcValue;

use super::transport::{Notification, NotificationSink};

type DispatchFn = dyn Fn(&[u8]) -> Result<(), ConversionError> + Send + Sync;

// =============================================================================
// Registration
// =============================================================================

/// One active change notification and its callback.
pub(crate) struct Registration {
    symbol: String,
    symbol_handle: SymbolHandle,
    attributes: NotificationAttributes,
    value_type: &'static str,
    created_at: DateTime<Utc>,
    dispatch: Box<DispatchFn>,
    notifications: AtomicU64,
    last_notification: Mutex<Option<DateTime<Utc>>>,
}

impl Registration {
    /// Wraps a typed callback.
    pub(crate) fn typed<V, F>(
        symbol: impl Into<String>,
        symbol_handle: SymbolHandle,
        attributes: NotificationAttributes,
        callback: F,
    ) -> Self
    where
        V: PlcValue,
        F: Fn(V) + Send + Sync + 'static,
    {
        Self {
            symbol: symbol.into(),
            symbol_handle,
            attributes,
            value_type: V::TYPE_NAME,
            created_at: Utc::now(),
            dispatch: Box::new(move |bytes: &[u8]| {
                callback(V::decode(bytes)?);
                Ok(())
            }),
            notifications: AtomicU64::new(0),
            last_notification: Mutex::new(None),
        }
    }

    /// Returns the symbol this registration watches.
    pub(crate) fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the symbol handle the notification is attached to.
    pub(crate) fn symbol_handle(&self) -> SymbolHandle {
        self.symbol_handle
    }

    fn info(&self, handle: NotificationHandle) -> SubscriptionInfo {
        SubscriptionInfo {
            handle,
            symbol: self.symbol.clone(),
            symbol_handle: self.symbol_handle,
            value_type: self.value_type,
            mode: self.attributes.mode,
            cycle_time: self.attributes.cycle_time,
            created_at: self.created_at,
            notifications: self.notifications.load(Ordering::Relaxed),
            last_notification: *self.last_notification.lock(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("symbol", &self.symbol)
            .field("symbol_handle", &self.symbol_handle)
            .field("value_type", &self.value_type)
            .field("cycle_time", &self.attributes.cycle_time)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SubscriptionInfo
// =============================================================================

/// Snapshot of an active subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    /// Notification handle.
    pub handle: NotificationHandle,
    /// Watched symbol.
    pub symbol: String,
    /// Handle of the watched symbol.
    pub symbol_handle: SymbolHandle,
    /// Callback value type.
    pub value_type: &'static str,
    /// Transmission mode.
    pub mode: TransmissionMode,
    /// Minimum period between notifications.
    pub cycle_time: Duration,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Notifications dispatched so far.
    pub notifications: u64,
    /// Device timestamp of the last dispatched notification.
    pub last_notification: Option<DateTime<Utc>>,
}

// =============================================================================
// SubscriptionTable
// =============================================================================

/// Samples that arrived for unknown handles while a registration was in flight.
#[derive(Debug, Default)]
struct Parked {
    windows: usize,
    samples: HashMap<NotificationHandle, Notification>,
}

/// Lock-protected map from notification handle to registration.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    registrations: RwLock<HashMap<NotificationHandle, Arc<Registration>>>,
    parked: Mutex<Parked>,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Keeps unknown-handle samples parked until dropped.
#[derive(Debug)]
pub(crate) struct RegistrationWindow<'a> {
    table: &'a SubscriptionTable,
}

impl Drop for RegistrationWindow<'_> {
    fn drop(&mut self) {
        let discarded = {
            let mut parked = self.table.parked.lock();
            parked.windows = parked.windows.saturating_sub(1);
            if parked.windows == 0 {
                parked.samples.drain().count()
            } else {
                0
            }
        };
        if discarded > 0 {
            self.table
                .dropped
                .fetch_add(discarded as u64, Ordering::Relaxed);
            tracing::debug!(discarded, "Discarding parked notifications for unknown handles");
        }
    }
}

impl SubscriptionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts parking samples for unknown handles until the window is dropped.
    pub(crate) fn open_registration(&self) -> RegistrationWindow<'_> {
        self.parked.lock().windows += 1;
        RegistrationWindow { table: self }
    }

    /// Adds a registration, replacing any stale entry with the same handle.
    ///
    /// A sample parked for `handle` is dispatched to the new registration.
    pub(crate) fn insert(&self, handle: NotificationHandle, registration: Registration) {
        let registration = Arc::new(registration);
        let (previous, parked) = {
            let mut registrations = self.registrations.write();
            let previous = registrations.insert(handle, Arc::clone(&registration));
            let parked = self.parked.lock().samples.remove(&handle);
            (previous, parked)
        };
        if let Some(previous) = previous {
            tracing::warn!(
                notification_handle = handle.value(),
                symbol = previous.symbol(),
                "Device reused an active notification handle, dropping old callback"
            );
        }
        if let Some(notification) = parked {
            self.dispatch(&registration, notification);
        }
    }

    /// Returns the number of samples waiting for their registration.
    pub fn parked_count(&self) -> usize {
        self.parked.lock().samples.len()
    }

    /// Removes a registration.
    pub(crate) fn remove(&self, handle: NotificationHandle) -> Option<Arc<Registration>> {
        self.registrations.write().remove(&handle)
    }

    /// Removes every registration attached to `symbol_handle`, returning their handles.
    pub(crate) fn remove_for_symbol_handle(
        &self,
        symbol_handle: SymbolHandle,
    ) -> Vec<NotificationHandle> {
        let mut registrations = self.registrations.write();
        let mut handles: Vec<NotificationHandle> = registrations
            .iter()
            .filter(|(_, r)| r.symbol_handle() == symbol_handle)
            .map(|(h, _)| *h)
            .collect();
        for handle in &handles {
            registrations.remove(handle);
        }
        handles.sort();
        handles
    }

    /// Removes every registration.
    pub(crate) fn drain(&self) -> Vec<(NotificationHandle, Arc<Registration>)> {
        let mut drained: Vec<_> = self.registrations.write().drain().collect();
        drained.sort_by_key(|(h, _)| *h);
        drained
    }

    /// Returns `true` if `handle` is registered.
    pub fn contains(&self, handle: NotificationHandle) -> bool {
        self.registrations.read().contains_key(&handle)
    }

    /// Returns the handles attached to `symbol_handle`.
    pub fn handles_for(&self, symbol_handle: SymbolHandle) -> Vec<NotificationHandle> {
        let mut handles: Vec<NotificationHandle> = self
            .registrations
            .read()
            .iter()
            .filter(|(_, r)| r.symbol_handle() == symbol_handle)
            .map(|(h, _)| *h)
            .collect();
        handles.sort();
        handles
    }

    /// Returns a snapshot of every registration, ordered by handle.
    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self
            .registrations
            .read()
            .iter()
            .map(|(h, r)| r.info(*h))
            .collect();
        infos.sort_by_key(|i| i.handle);
        infos
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    /// Returns `true` if there are no registrations.
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Returns the number of notifications passed to callbacks.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Returns the number of notifications dropped (unknown handle or bad payload).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SubscriptionTable {
    fn dispatch(&self, registration: &Registration, notification: Notification) {
        match (registration.dispatch)(&notification.data[..]) {
            Ok(()) => {
                registration.notifications.fetch_add(1, Ordering::Relaxed);
                *registration.last_notification.lock() = Some(notification.timestamp);
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    notification_handle = notification.handle.value(),
                    symbol = registration.symbol(),
                    "Notification dispatched"
                );
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    notification_handle = notification.handle.value(),
                    symbol = registration.symbol(),
                    error = %e,
                    "Dropping undecodable notification"
                );
            }
        }
    }
}

impl NotificationSink for SubscriptionTable {
    fn deliver(&self, notification: Notification) {
        let registration = {
            let registrations = self.registrations.read();
            match registrations.get(&notification.handle) {
                Some(registration) => Some(Arc::clone(registration)),
                None => {
                    let mut parked = self.parked.lock();
                    if parked.windows > 0 {
                        tracing::trace!(
                            notification_handle = notification.handle.value(),
                            "Parking notification until its registration is stored"
                        );
                        // Latest sample wins; the one it replaces is lost.
                        if parked.samples.insert(notification.handle, notification).is_some() {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        return;
                    }
                    None
                }
            }
        };

        let Some(registration) = registration else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                notification_handle = notification.handle.value(),
                "Dropping notification for unknown handle"
            );
            return;
        };

        self.dispatch(&registration, notification);
    }
}

// =============================================================================
// Tests
// =============================================================================
