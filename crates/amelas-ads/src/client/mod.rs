// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Symbol-indexed ADS client.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          AdsClient                              │
//! │        (connect / read / write / subscribe by symbol name)      │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//! ┌─────────────────┐ ┌─────────────────────┐ ┌─────────────────────┐
//! │   HandleCache   │ │  SubscriptionTable  │ │   Arc<Mutex<T>>     │
//! │ symbol → handle │ │ notif. → callback   │ │   T: AdsTransport   │
//! └─────────────────┘ └─────────────────────┘ └─────────────────────┘
//!                                ▲                       │
//!                                └── NotificationSink ───┘
//! ```
//!
//! Every device call runs while holding the transport mutex, after the
//! connection state has been checked under that same lock. No device I/O is
//! issued once `disconnect` has completed.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use amelas_ads::client::AdsClient;
//!
//! let client = AdsClient::new(transport);
//! client.connect("5.62.215.36.1.1:851").await?;
//!
//! client.write("MAIN.targetAz", 182.5f64).await?;
//! let az: f64 = client.read("MAIN.actualAz").await?;
//!
//! client
//!     .subscribe("MAIN.pulse", |on: bool| println!("pulse {on}"), Duration::from_millis(100))
//!     .await?;
//!
//! client.disconnect().await?;
//! ```

mod cache;
mod subscription;
mod transport;

pub use cache::HandleCache;
pub use subscription::{SubscriptionInfo, SubscriptionTable};
pub use transport::{AdsTransport, Notification, NotificationSink, TransportResult};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex, MutexGuard};

use crate::config::AdsClientConfig;
use crate::error::{AdsError, AdsResult, TransportError};
use crate::types::{AmsAddr, ConnectionState, NotificationHandle, SymbolHandle};
use crate::value::PlcValue;

use cache::CacheInsert;
use subscription::Registration;

// =============================================================================
// Session
// =============================================================================

/// Device registrations the client no longer tracks but the device still holds.
#[derive(Debug, Default)]
struct Deferred {
    notifications: Vec<NotificationHandle>,
    handles: Vec<(String, SymbolHandle)>,
}

/// Per-connection state shared with the drop-time teardown task.
#[derive(Debug, Default)]
struct Session {
    state: RwLock<ConnectionState>,
    handles: HandleCache,
    subscriptions: Arc<SubscriptionTable>,
    deferred: parking_lot::Mutex<Deferred>,
}

impl Session {
    fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }

    fn defer_cancellation(&self, handle: NotificationHandle) {
        let mut deferred = self.deferred.lock();
        if !deferred.notifications.contains(&handle) {
            deferred.notifications.push(handle);
        }
    }

    fn defer_release(&self, symbol: &str, handle: SymbolHandle) {
        self.deferred.lock().handles.push((symbol.to_string(), handle));
    }

    /// Takes a cancellation that failed earlier, if `handle` has one.
    fn take_cancellation(&self, handle: NotificationHandle) -> bool {
        let mut deferred = self.deferred.lock();
        let before = deferred.notifications.len();
        deferred.notifications.retain(|h| *h != handle);
        deferred.notifications.len() != before
    }

    fn take_deferred(&self) -> Deferred {
        std::mem::take(&mut *self.deferred.lock())
    }
}

// =============================================================================
// AdsClient
// =============================================================================

/// ADS client with a symbol handle cache and managed notifications.
///
/// The client is `Send + Sync` and all operations take `&self`; share it
/// across tasks with an `Arc`. Device calls are serialized on the transport.
///
/// Dropping a connected client schedules a best-effort teardown on the
/// current tokio runtime. Call [`disconnect`](Self::disconnect) explicitly to
/// observe teardown errors.
pub struct AdsClient<T: AdsTransport + 'static> {
    transport: Arc<Mutex<T>>,
    session: Arc<Session>,
    config: AdsClientConfig,
    stats: ClientStats,
}

impl<T: AdsTransport + 'static> AdsClient<T> {
    /// Creates a disconnected client with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, AdsClientConfig::default())
    }

    /// Creates a disconnected client with the given configuration.
    pub fn with_config(transport: T, config: AdsClientConfig) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            session: Arc::new(Session::default()),
            config,
            stats: ClientStats::new(),
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &AdsClientConfig {
        &self.config
    }

    /// Returns the client statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Returns the display name of the transport.
    pub async fn transport_name(&self) -> String {
        self.transport.lock().await.display_name()
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        *self.session.state.read()
    }

    /// Returns `true` if a session is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Connects to the endpoint `o1.o2.o3.o4.o5.o6:port`.
    ///
    /// # Errors
    ///
    /// - [`AdsError::Address`] if `address` is malformed
    /// - [`TransportError::Open`] if the device rejects the session
    /// - [`TransportError::AlreadyConnected`] if a session is already open
    pub async fn connect(&self, address: &str) -> AdsResult<()> {
        let addr = address.parse::<AmsAddr>().map_err(|e| self.fail(e.into(), "connect"))?;
        self.connect_addr(addr).await
    }

    /// Connects to the endpoint named in the client configuration.
    pub async fn connect_configured(&self) -> AdsResult<()> {
        let addr = self
            .config
            .target_addr()
            .map_err(|e| self.fail(e, "connect"))?;
        self.connect_addr(addr).await
    }

    /// Connects to an already parsed endpoint.
    pub async fn connect_addr(&self, addr: AmsAddr) -> AdsResult<()> {
        let mut transport = self.transport.lock().await;

        let current = self.state();
        if let Some(target) = current.target() {
            return Err(self.fail(TransportError::AlreadyConnected { target }.into(), "connect"));
        }

        transport.open(addr).await.map_err(|code| {
            self.fail(TransportError::Open { target: addr, code }.into(), "connect")
        })?;

        *self.session.state.write() = ConnectionState::Connected(addr);
        self.stats.record_connection();

        tracing::info!(
            addr = %addr,
            transport = %transport.display_name(),
            "Connected to ADS device"
        );
        Ok(())
    }

    /// Closes the session.
    ///
    /// Cancels every notification, releases cached handles (unless disabled
    /// in the configuration), and closes the transport session. Failures along
    /// the way are logged; the client ends up disconnected in every case.
    /// Disconnecting a disconnected client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Close`] if the device rejected the close
    /// request.
    pub async fn disconnect(&self) -> AdsResult<()> {
        let mut transport = self.transport.lock().await;
        if !self.session.is_connected() {
            return Ok(());
        }

        let result = teardown(
            &mut *transport,
            &self.session,
            self.config.release_handles_on_disconnect,
        )
        .await;
        if result.is_err() {
            self.stats.record_failure();
        }
        result
    }

    // =========================================================================
    // Symbol Resolution
    // =========================================================================

    /// Resolves `symbol` to a device handle, using the cache when possible.
    ///
    /// A cached symbol costs no device I/O. A failed resolution is not cached.
    pub async fn resolve_handle(&self, symbol: &str) -> AdsResult<SymbolHandle> {
        let transport = self.connected_transport().await?;
        self.resolve_with(&*transport, symbol).await
    }

    /// Returns the cached handle of `symbol` without device I/O.
    pub fn cached_handle(&self, symbol: &str) -> Option<SymbolHandle> {
        self.session.handles.get(symbol)
    }

    /// Returns the cached symbol names, sorted.
    pub fn cached_symbols(&self) -> Vec<String> {
        self.session.handles.symbols()
    }

    /// Drops the cached handle of `symbol`.
    ///
    /// Notifications attached to the handle are cancelled and the handle is
    /// released on the device. Use this after the PLC program was reloaded.
    /// Returns `false` if the symbol was not cached.
    pub async fn invalidate_handle(&self, symbol: &str) -> AdsResult<bool> {
        let transport = self.connected_transport().await?;
        let Some(handle) = self.session.handles.remove(symbol) else {
            return Ok(false);
        };

        let cancelled = self.unsubscribe_all_for_handle(&*transport, handle).await;
        let released = transport.release_handle(handle).await.map_err(|code| {
            self.session.defer_release(symbol, handle);
            AdsError::release(symbol, code)
        });

        tracing::debug!(symbol = symbol, handle = %handle, "Symbol handle invalidated");

        cancelled.map_err(|e| self.fail(e, "invalidate_handle"))?;
        released.map_err(|e| self.fail(e, "invalidate_handle"))?;
        Ok(true)
    }

    // =========================================================================
    // Typed I/O
    // =========================================================================

    /// Reads `symbol` as `V`.
    ///
    /// Exactly `V::SIZE` bytes are requested; `V` must match the size of the
    /// PLC variable.
    pub async fn read<V: PlcValue>(&self, symbol: &str) -> AdsResult<V> {
        let bytes = self.read_raw(symbol, V::SIZE).await?;
        V::decode(&bytes).map_err(|e| self.fail(e.into(), "read"))
    }

    /// Writes `value` to `symbol`.
    ///
    /// Exactly `V::SIZE` bytes are written; `V` must match the size of the
    /// PLC variable.
    pub async fn write<V: PlcValue>(&self, symbol: &str, value: V) -> AdsResult<()> {
        self.write_raw(symbol, &value.encode()).await
    }

    /// Reads `len` raw bytes from `symbol`.
    pub async fn read_raw(&self, symbol: &str, len: usize) -> AdsResult<Vec<u8>> {
        let transport = self.connected_transport().await?;
        let handle = self.resolve_with(&*transport, symbol).await?;

        let bytes = transport
            .read(handle, len)
            .await
            .map_err(|code| self.fail(AdsError::read(symbol, code), "read"))?;

        self.stats.record_read();
        tracing::trace!(symbol = symbol, len = bytes.len(), "Symbol read");
        Ok(bytes)
    }

    /// Writes raw bytes to `symbol`.
    pub async fn write_raw(&self, symbol: &str, data: &[u8]) -> AdsResult<()> {
        let transport = self.connected_transport().await?;
        let handle = self.resolve_with(&*transport, symbol).await?;

        transport
            .write(handle, data)
            .await
            .map_err(|code| self.fail(AdsError::write(symbol, code), "write"))?;

        self.stats.record_write();
        tracing::trace!(symbol = symbol, len = data.len(), "Symbol written");
        Ok(())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Subscribes `callback` to changes of `symbol`.
    ///
    /// The device sends at most one notification per `min_period`; faster
    /// changes are coalesced on the device. `callback` runs on the transport's
    /// delivery thread and must not block.
    ///
    /// A sample the device sends before registration completes, such as the
    /// initial value, is kept and passed to `callback` once the handle is known.
    pub async fn subscribe<V, F>(
        &self,
        symbol: &str,
        callback: F,
        min_period: Duration,
    ) -> AdsResult<NotificationHandle>
    where
        V: PlcValue,
        F: Fn(V) + Send + Sync + 'static,
    {
        let transport = self.connected_transport().await?;
        let handle = self.resolve_with(&*transport, symbol).await?;

        let attributes = self.config.notification_attributes(V::SIZE, min_period);
        let sink: Arc<dyn NotificationSink> = self.session.subscriptions.clone();
        let window = self.session.subscriptions.open_registration();
        let notification = transport
            .add_notification(handle, attributes, sink)
            .await
            .map_err(|code| self.fail(AdsError::subscribe(symbol, code), "subscribe"))?;

        self.session.subscriptions.insert(
            notification,
            Registration::typed::<V, F>(symbol, handle, attributes, callback),
        );
        drop(window);
        self.stats.record_subscription();

        tracing::info!(
            symbol = symbol,
            notification_handle = notification.value(),
            cycle_time_ms = u64::try_from(min_period.as_millis()).unwrap_or(u64::MAX),
            value_type = V::TYPE_NAME,
            "Subscribed to symbol"
        );
        Ok(notification)
    }

    /// Subscribes with the configured default period.
    pub async fn subscribe_default<V, F>(
        &self,
        symbol: &str,
        callback: F,
    ) -> AdsResult<NotificationHandle>
    where
        V: PlcValue,
        F: Fn(V) + Send + Sync + 'static,
    {
        self.subscribe(symbol, callback, self.config.default_cycle_time)
            .await
    }

    /// Subscribes to `symbol` and returns a channel of decoded values.
    ///
    /// The channel closes when the subscription is cancelled.
    pub async fn subscribe_channel<V: PlcValue>(
        &self,
        symbol: &str,
        min_period: Duration,
    ) -> AdsResult<(NotificationHandle, mpsc::UnboundedReceiver<V>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self
            .subscribe(
                symbol,
                move |value: V| {
                    // Receiver gone; the subscription stays until cancelled.
                    let _ = tx.send(value);
                },
                min_period,
            )
            .await?;
        Ok((handle, rx))
    }

    /// Cancels one notification. Unknown handles are ignored.
    ///
    /// If the device rejects the cancellation, the callback is still removed
    /// and the cancellation is retried by the next `unsubscribe` of the same
    /// handle or at disconnect.
    pub async fn unsubscribe(&self, handle: NotificationHandle) -> AdsResult<()> {
        let transport = self.connected_transport().await?;
        let symbol = match self.session.subscriptions.remove(handle) {
            Some(registration) => registration.symbol().to_string(),
            None if self.session.take_cancellation(handle) => String::new(),
            None => return Ok(()),
        };

        transport.delete_notification(handle).await.map_err(|code| {
            self.session.defer_cancellation(handle);
            self.fail(AdsError::unsubscribe(handle, code), "unsubscribe")
        })?;

        self.stats.record_unsubscription(1);
        tracing::info!(
            symbol = %symbol,
            notification_handle = handle.value(),
            "Unsubscribed"
        );
        Ok(())
    }

    /// Returns the number of cancellations and releases the device rejected
    /// that are still outstanding. They are retried at disconnect.
    pub fn deferred_count(&self) -> usize {
        let deferred = self.session.deferred.lock();
        deferred.notifications.len() + deferred.handles.len()
    }

    /// Cancels every notification registered for `symbol`.
    ///
    /// A symbol that is not cached has no notifications; the call is then a
    /// no-op and resolves nothing.
    pub async fn unsubscribe_all(&self, symbol: &str) -> AdsResult<()> {
        let transport = self.connected_transport().await?;
        let Some(handle) = self.session.handles.get(symbol) else {
            return Ok(());
        };

        self.unsubscribe_all_for_handle(&*transport, handle)
            .await
            .map_err(|e| self.fail(e, "unsubscribe_all"))?;
        Ok(())
    }

    /// Returns a snapshot of the active subscriptions.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.session.subscriptions.snapshot()
    }

    /// Returns the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.session.subscriptions.len()
    }

    /// Returns the number of notifications passed to callbacks.
    pub fn notifications_dispatched(&self) -> u64 {
        self.session.subscriptions.dispatched_count()
    }

    /// Returns the number of notifications dropped before reaching a callback.
    pub fn notifications_dropped(&self) -> u64 {
        self.session.subscriptions.dropped_count()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Locks the transport and checks the session under the lock.
    async fn connected_transport(&self) -> AdsResult<MutexGuard<'_, T>> {
        let transport = self.transport.lock().await;
        if self.session.is_connected() {
            Ok(transport)
        } else {
            Err(AdsError::not_connected())
        }
    }

    async fn resolve_with(&self, transport: &T, symbol: &str) -> AdsResult<SymbolHandle> {
        if let Some(handle) = self.session.handles.get(symbol) {
            self.stats.record_cache_hit();
            tracing::trace!(symbol = symbol, handle = %handle, "Symbol handle cache hit");
            return Ok(handle);
        }

        let handle = transport
            .resolve_handle(symbol)
            .await
            .map_err(|code| self.fail(AdsError::resolution(symbol, code), "resolve"))?;
        self.stats.record_resolution();

        match self.session.handles.insert(symbol, handle) {
            CacheInsert::Inserted(handle) => {
                tracing::debug!(symbol = symbol, handle = %handle, "Symbol handle resolved");
                Ok(handle)
            }
            CacheInsert::Existing { cached, surplus } => {
                if let Err(code) = transport.release_handle(surplus).await {
                    self.session.defer_release(symbol, surplus);
                    AdsError::release(symbol, code).log("resolve");
                }
                Ok(cached)
            }
        }
    }

    /// Cancels every notification attached to `handle`.
    ///
    /// Registrations are removed before the device is asked, so dispatch stops
    /// even if a cancellation fails. Every cancellation is attempted; the
    /// first failure is returned.
    async fn unsubscribe_all_for_handle(&self, transport: &T, handle: SymbolHandle) -> AdsResult<()> {
        let notifications = self.session.subscriptions.remove_for_symbol_handle(handle);
        if notifications.is_empty() {
            return Ok(());
        }

        let mut first_error = None;
        for notification in &notifications {
            if let Err(code) = transport.delete_notification(*notification).await {
                self.session.defer_cancellation(*notification);
                let error = AdsError::unsubscribe(*notification, code);
                error.log("unsubscribe_all");
                first_error.get_or_insert(error);
            }
        }

        self.stats.record_unsubscription(notifications.len() as u64);
        tracing::info!(
            handle = %handle,
            count = notifications.len(),
            "Cancelled notifications for symbol handle"
        );

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fail(&self, error: AdsError, context: &str) -> AdsError {
        self.stats.record_failure();
        error.log(context);
        error
    }
}

impl<T: AdsTransport + 'static> Drop for AdsClient<T> {
    fn drop(&mut self) {
        if !self.session.is_connected() {
            return;
        }

        let subscriptions = self.session.subscriptions.len();
        let handles = self.session.handles.len();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let transport = Arc::clone(&self.transport);
                let session = Arc::clone(&self.session);
                let release = self.config.release_handles_on_disconnect;
                tracing::debug!(
                    subscriptions = subscriptions,
                    handles = handles,
                    "ADS client dropped while connected, scheduling teardown"
                );
                runtime.spawn(async move {
                    let mut transport = transport.lock().await;
                    let connected = session.is_connected();
                    if connected {
                        // Errors are already logged by teardown.
                        let _ = teardown(&mut *transport, &session, release).await;
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    subscriptions = subscriptions,
                    handles = handles,
                    "ADS client dropped while connected outside a tokio runtime, \
                     device registrations are left behind"
                );
            }
        }
    }
}

/// Best-effort session teardown. The caller holds the transport lock.
///
/// Cancellations and releases the device rejected earlier are retried;
/// explicitly invalidated handles are released even if `release_handles` is
/// off.
async fn teardown<T: AdsTransport>(
    transport: &mut T,
    session: &Session,
    release_handles: bool,
) -> AdsResult<()> {
    let deferred = session.take_deferred();

    let active = session.subscriptions.drain().into_iter().map(|(handle, registration)| {
        (handle, registration.symbol().to_string())
    });
    let retried = deferred.notifications.into_iter().map(|handle| (handle, String::new()));
    for (handle, symbol) in active.chain(retried) {
        if let Err(code) = transport.delete_notification(handle).await {
            tracing::warn!(
                notification_handle = handle.value(),
                symbol = %symbol,
                error = %code,
                "Failed to cancel notification during disconnect"
            );
        }
    }

    let cached = session
        .handles
        .drain()
        .into_iter()
        .filter(|_| release_handles);
    for (symbol, handle) in cached.chain(deferred.handles) {
        if let Err(code) = transport.release_handle(handle).await {
            tracing::warn!(
                symbol = %symbol,
                handle = %handle,
                error = %code,
                "Failed to release symbol handle during disconnect"
            );
        }
    }

    let closed = transport.close().await;
    let previous = std::mem::take(&mut *session.state.write());

    match closed {
        Ok(()) => {
            if let Some(addr) = previous.target() {
                tracing::info!(addr = %addr, "Disconnected from ADS device");
            }
            Ok(())
        }
        Err(code) => {
            let error = AdsError::from(TransportError::Close { code });
            error.log("disconnect");
            Err(error)
        }
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Client operation counters.
#[derive(Debug, Default)]
pub struct ClientStats {
    connections: AtomicU64,
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    subscriptions: AtomicU64,
    unsubscriptions: AtomicU64,
    failures: AtomicU64,
}

impl ClientStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unsubscription(&self, count: u64) {
        self.unsubscriptions.fetch_add(count, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of sessions opened.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Returns the number of device-side symbol resolutions.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Returns the number of resolutions served from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of successful reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of subscriptions created.
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Returns the number of notifications cancelled by unsubscribe calls.
    pub fn unsubscriptions(&self) -> u64 {
        self.unsubscriptions.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the share of resolutions served from the cache (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits();
        let total = hits + self.resolutions();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        for counter in [
            &self.connections,
            &self.resolutions,
            &self.cache_hits,
            &self.reads,
            &self.writes,
            &self.subscriptions,
            &self.unsubscriptions,
            &self.failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
