// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory ADS device and a transport bound to it.
//!
//! ## Design Principles
//!
//! - [`MockDevice`] is shared through an `Arc`, so a test keeps inspecting it
//!   after the transport has been moved into the client
//! - Every transport method is counted and can be forced to fail with a
//!   chosen return code
//! - Notifications are coalesced on the device: a registration is notified at
//!   most once per cycle time, and only on change in on-change mode
//! - Values can be changed from any thread; delivery runs on the caller's
//!   thread, like a router receive loop

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use amelas_ads::{
    AdsReturnCode, AdsTransport, AmsAddr, Notification, NotificationAttributes,
    NotificationHandle, NotificationSink, PlcValue, SymbolHandle, TransmissionMode,
    TransportResult,
};

// =============================================================================
// Mock Device
// =============================================================================

/// Injected failures. `None` means the call succeeds.
#[derive(Debug, Default)]
struct Faults {
    open: Option<AdsReturnCode>,
    close: Option<AdsReturnCode>,
    release: Option<AdsReturnCode>,
    read: Option<AdsReturnCode>,
    write: Option<AdsReturnCode>,
    add_notification: Option<AdsReturnCode>,
    delete_notification: Option<AdsReturnCode>,
    resolve: HashMap<String, AdsReturnCode>,
}

/// A device-side notification registration.
struct DeviceNotification {
    symbol: String,
    symbol_handle: SymbolHandle,
    attributes: NotificationAttributes,
    sink: Arc<dyn NotificationSink>,
    last_sent: Option<Instant>,
    last_value: Vec<u8>,
}

impl DeviceNotification {
    fn is_due(&self, value: &[u8], now: Instant) -> bool {
        let period_elapsed = self
            .last_sent
            .map_or(true, |sent| now.duration_since(sent) >= self.attributes.cycle_time);
        match self.attributes.mode {
            TransmissionMode::ServerOnChange => period_elapsed && self.last_value != value,
            TransmissionMode::ServerCycle => period_elapsed,
        }
    }
}

/// Call counters of a [`MockDevice`].
#[derive(Debug, Default)]
struct Counters {
    open: AtomicU64,
    close: AtomicU64,
    resolve: AtomicU64,
    release: AtomicU64,
    read: AtomicU64,
    write: AtomicU64,
    add_notification: AtomicU64,
    delete_notification: AtomicU64,
}

/// In-memory PLC with named variables.
///
/// Variables must be defined before they can be resolved. Each resolution
/// hands out a fresh handle, as a real runtime does.
pub struct MockDevice {
    memory: Mutex<HashMap<String, Vec<u8>>>,
    handles: Mutex<HashMap<SymbolHandle, String>>,
    notifications: Mutex<HashMap<NotificationHandle, DeviceNotification>>,
    session: Mutex<Option<AmsAddr>>,
    faults: Mutex<Faults>,
    counters: Counters,
    next_handle: AtomicU32,
    next_notification: AtomicU32,
    initial_notifications: AtomicBool,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            notifications: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            faults: Mutex::new(Faults::default()),
            counters: Counters::default(),
            next_handle: AtomicU32::new(0x8000_0000),
            next_notification: AtomicU32::new(1),
            initial_notifications: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("symbols", &self.memory.lock().len())
            .field("live_handles", &self.handles.lock().len())
            .field("live_notifications", &self.notifications.lock().len())
            .field("session", &*self.session.lock())
            .finish()
    }
}

impl MockDevice {
    /// Creates an empty device, shared between transports and the test.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sends the current value as soon as a notification is added, before
    /// its handle is returned to the client.
    pub fn send_initial_notifications(&self, enabled: bool) {
        self.initial_notifications.store(enabled, Ordering::SeqCst);
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Defines a variable with an initial value.
    pub fn define<V: PlcValue>(&self, symbol: &str, initial: V) {
        self.define_raw(symbol, initial.encode());
    }

    /// Defines a variable with raw initial bytes.
    pub fn define_raw(&self, symbol: &str, bytes: Vec<u8>) {
        self.memory.lock().insert(symbol.to_string(), bytes);
    }

    /// Removes a variable, as an online change that deletes it would.
    pub fn undefine(&self, symbol: &str) {
        self.memory.lock().remove(symbol);
    }

    /// Returns the current value of a variable.
    pub fn value<V: PlcValue>(&self, symbol: &str) -> Option<V> {
        self.value_raw(symbol).and_then(|bytes| V::decode(&bytes).ok())
    }

    /// Returns the raw bytes of a variable.
    pub fn value_raw(&self, symbol: &str) -> Option<Vec<u8>> {
        self.memory.lock().get(symbol).cloned()
    }

    /// Changes a variable from the PLC side and notifies registrations.
    ///
    /// Returns the number of notifications delivered.
    pub fn set_value<V: PlcValue>(&self, symbol: &str, value: V) -> usize {
        self.set_raw(symbol, value.encode())
    }

    /// Changes raw bytes from the PLC side and notifies registrations.
    pub fn set_raw(&self, symbol: &str, bytes: Vec<u8>) -> usize {
        self.memory.lock().insert(symbol.to_string(), bytes.clone());
        self.notify(symbol, &bytes)
    }

    /// Delivers `bytes` on `handle` bypassing change and period filtering.
    ///
    /// Returns `false` if no such registration exists.
    pub fn emit(&self, handle: NotificationHandle, bytes: Vec<u8>) -> bool {
        let sink = self
            .notifications
            .lock()
            .get(&handle)
            .map(|registration| Arc::clone(&registration.sink));
        match sink {
            Some(sink) => {
                sink.deliver(Notification::new(handle, bytes));
                true
            }
            None => false,
        }
    }

    fn notify(&self, symbol: &str, bytes: &[u8]) -> usize {
        let now = Instant::now();
        let mut due: Vec<(NotificationHandle, Arc<dyn NotificationSink>)> = {
            let mut notifications = self.notifications.lock();
            notifications
                .iter_mut()
                .filter(|(_, n)| n.symbol == symbol && n.is_due(bytes, now))
                .map(|(handle, n)| {
                    n.last_sent = Some(now);
                    n.last_value = bytes.to_vec();
                    (*handle, Arc::clone(&n.sink))
                })
                .collect()
        };
        due.sort_by_key(|(handle, _)| *handle);

        for (handle, sink) in &due {
            sink.deliver(Notification::new(*handle, bytes.to_vec()));
        }
        due.len()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns `true` while a session is open.
    pub fn is_open(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Returns the endpoint of the open session.
    pub fn session_target(&self) -> Option<AmsAddr> {
        *self.session.lock()
    }

    /// Returns the number of handles resolved and not yet released.
    pub fn live_handles(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns the number of live handles for `symbol`.
    pub fn live_handles_for(&self, symbol: &str) -> usize {
        self.handles.lock().values().filter(|s| *s == symbol).count()
    }

    /// Returns the number of active notification registrations.
    pub fn live_notifications(&self) -> usize {
        self.notifications.lock().len()
    }

    /// Returns the active notification handles, sorted.
    pub fn notification_handles(&self) -> Vec<NotificationHandle> {
        let mut handles: Vec<_> = self.notifications.lock().keys().copied().collect();
        handles.sort();
        handles
    }

    /// Returns the attributes a notification was registered with.
    pub fn notification_attributes(
        &self,
        handle: NotificationHandle,
    ) -> Option<NotificationAttributes> {
        self.notifications.lock().get(&handle).map(|n| n.attributes)
    }

    /// Returns the symbol handle a notification is attached to.
    pub fn notification_symbol_handle(&self, handle: NotificationHandle) -> Option<SymbolHandle> {
        self.notifications.lock().get(&handle).map(|n| n.symbol_handle)
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes `open` fail with `code`.
    pub fn fail_open(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().open = code;
    }

    /// Makes `close` fail with `code`.
    pub fn fail_close(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().close = code;
    }

    /// Makes resolution of `symbol` fail with `code`.
    pub fn fail_resolve(&self, symbol: &str, code: Option<AdsReturnCode>) {
        let mut faults = self.faults.lock();
        match code {
            Some(code) => faults.resolve.insert(symbol.to_string(), code),
            None => faults.resolve.remove(symbol),
        };
    }

    /// Makes `release_handle` fail with `code`.
    pub fn fail_release(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().release = code;
    }

    /// Makes `read` fail with `code`.
    pub fn fail_read(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().read = code;
    }

    /// Makes `write` fail with `code`.
    pub fn fail_write(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().write = code;
    }

    /// Makes `add_notification` fail with `code`.
    pub fn fail_add_notification(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().add_notification = code;
    }

    /// Makes `delete_notification` fail with `code`.
    pub fn fail_delete_notification(&self, code: Option<AdsReturnCode>) {
        self.faults.lock().delete_notification = code;
    }

    /// Clears every injected failure.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Returns the number of `open` calls.
    pub fn open_count(&self) -> u64 {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Returns the number of `close` calls.
    pub fn close_count(&self) -> u64 {
        self.counters.close.load(Ordering::SeqCst)
    }

    /// Returns the number of `resolve_handle` calls.
    pub fn resolve_count(&self) -> u64 {
        self.counters.resolve.load(Ordering::SeqCst)
    }

    /// Returns the number of `release_handle` calls.
    pub fn release_count(&self) -> u64 {
        self.counters.release.load(Ordering::SeqCst)
    }

    /// Returns the number of `read` calls.
    pub fn read_count(&self) -> u64 {
        self.counters.read.load(Ordering::SeqCst)
    }

    /// Returns the number of `write` calls.
    pub fn write_count(&self) -> u64 {
        self.counters.write.load(Ordering::SeqCst)
    }

    /// Returns the number of `add_notification` calls.
    pub fn add_notification_count(&self) -> u64 {
        self.counters.add_notification.load(Ordering::SeqCst)
    }

    /// Returns the number of `delete_notification` calls.
    pub fn delete_notification_count(&self) -> u64 {
        self.counters.delete_notification.load(Ordering::SeqCst)
    }

    /// Returns the number of calls of any kind.
    pub fn total_calls(&self) -> u64 {
        self.open_count()
            + self.close_count()
            + self.resolve_count()
            + self.release_count()
            + self.read_count()
            + self.write_count()
            + self.add_notification_count()
            + self.delete_notification_count()
    }

    /// Resets all counters.
    pub fn reset_counts(&self) {
        for counter in [
            &self.counters.open,
            &self.counters.close,
            &self.counters.resolve,
            &self.counters.release,
            &self.counters.read,
            &self.counters.write,
            &self.counters.add_notification,
            &self.counters.delete_notification,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> TransportResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AdsReturnCode::PORT_NOT_OPEN)
        }
    }

    fn symbol_of(&self, handle: SymbolHandle) -> TransportResult<String> {
        self.handles
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(AdsReturnCode::INVALID_INDEX_OFFSET)
    }

    fn size_of(&self, symbol: &str) -> TransportResult<usize> {
        self.memory
            .lock()
            .get(symbol)
            .map(Vec::len)
            .ok_or(AdsReturnCode::SYMBOL_NOT_FOUND)
    }
}

// =============================================================================
// Mock Transport
// =============================================================================

/// [`AdsTransport`] backed by a [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockAdsTransport {
    device: Arc<MockDevice>,
}

impl Default for MockAdsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdsTransport {
    /// Creates a transport with a fresh, empty device.
    pub fn new() -> Self {
        Self::with_device(MockDevice::shared())
    }

    /// Creates a transport bound to `device`.
    pub fn with_device(device: Arc<MockDevice>) -> Self {
        Self { device }
    }

    /// Returns the device behind this transport.
    pub fn device(&self) -> Arc<MockDevice> {
        Arc::clone(&self.device)
    }
}

#[async_trait]
impl AdsTransport for MockAdsTransport {
    async fn open(&mut self, target: AmsAddr) -> TransportResult<()> {
        let device = &self.device;
        device.counters.open.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = device.faults.lock().open {
            return Err(code);
        }
        *device.session.lock() = Some(target);
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        let device = &self.device;
        device.counters.close.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().close {
            return Err(code);
        }
        *device.session.lock() = None;
        Ok(())
    }

    async fn resolve_handle(&self, symbol: &str) -> TransportResult<SymbolHandle> {
        let device = &self.device;
        device.counters.resolve.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().resolve.get(symbol).copied() {
            return Err(code);
        }
        device.size_of(symbol)?;

        let handle = SymbolHandle(device.next_handle.fetch_add(1, Ordering::SeqCst));
        device.handles.lock().insert(handle, symbol.to_string());
        Ok(handle)
    }

    async fn release_handle(&self, handle: SymbolHandle) -> TransportResult<()> {
        let device = &self.device;
        device.counters.release.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().release {
            return Err(code);
        }
        device
            .handles
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or(AdsReturnCode::INVALID_INDEX_OFFSET)
    }

    async fn read(&self, handle: SymbolHandle, len: usize) -> TransportResult<Vec<u8>> {
        let device = &self.device;
        device.counters.read.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().read {
            return Err(code);
        }

        let symbol = device.symbol_of(handle)?;
        let bytes = device
            .value_raw(&symbol)
            .ok_or(AdsReturnCode::SYMBOL_NOT_FOUND)?;
        if bytes.len() != len {
            return Err(AdsReturnCode::INVALID_SIZE);
        }
        Ok(bytes)
    }

    async fn write(&self, handle: SymbolHandle, data: &[u8]) -> TransportResult<()> {
        let device = &self.device;
        device.counters.write.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().write {
            return Err(code);
        }

        let symbol = device.symbol_of(handle)?;
        if device.size_of(&symbol)? != data.len() {
            return Err(AdsReturnCode::INVALID_SIZE);
        }
        device.set_raw(&symbol, data.to_vec());
        Ok(())
    }

    async fn add_notification(
        &self,
        handle: SymbolHandle,
        attributes: NotificationAttributes,
        sink: Arc<dyn NotificationSink>,
    ) -> TransportResult<NotificationHandle> {
        let device = &self.device;
        device.counters.add_notification.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().add_notification {
            return Err(code);
        }

        let symbol = device.symbol_of(handle)?;
        let current = device
            .value_raw(&symbol)
            .ok_or(AdsReturnCode::SYMBOL_NOT_FOUND)?;
        if current.len() != attributes.length {
            return Err(AdsReturnCode::INVALID_SIZE);
        }

        let notification =
            NotificationHandle(device.next_notification.fetch_add(1, Ordering::SeqCst));
        let initial = device.initial_notifications.load(Ordering::SeqCst);
        device.notifications.lock().insert(
            notification,
            DeviceNotification {
                symbol,
                symbol_handle: handle,
                attributes,
                sink: Arc::clone(&sink),
                last_sent: initial.then(Instant::now),
                last_value: current.clone(),
            },
        );
        if initial {
            sink.deliver(Notification::new(notification, current));
        }
        Ok(notification)
    }

    async fn delete_notification(&self, handle: NotificationHandle) -> TransportResult<()> {
        let device = &self.device;
        device.counters.delete_notification.fetch_add(1, Ordering::SeqCst);
        device.ensure_open()?;
        if let Some(code) = device.faults.lock().delete_notification {
            return Err(code);
        }
        device
            .notifications
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or(AdsReturnCode::INVALID_NOTIFICATION_HANDLE)
    }

    fn display_name(&self) -> String {
        "mock-ads".to_string()
    }
}

// =============================================================================
// Callback Recorder
// =============================================================================

/// Records values passed to a subscription callback.
#[derive(Debug)]
pub struct CallbackRecorder<V> {
    values: Arc<Mutex<Vec<V>>>,
}

impl<V> Clone for CallbackRecorder<V> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<V: Clone + Send + 'static> Default for CallbackRecorder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> CallbackRecorder<V> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a callback that records into this recorder.
    pub fn callback(&self) -> impl Fn(V) + Send + Sync + 'static {
        let values = Arc::clone(&self.values);
        move |value| values.lock().push(value)
    }

    /// Returns the recorded values.
    pub fn values(&self) -> Vec<V> {
        self.values.lock().clone()
    }

    /// Returns the number of recorded values.
    pub fn count(&self) -> usize {
        self.values.lock().len()
    }

    /// Waits until at least `count` values are recorded or `timeout` elapses.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.count() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}
