// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Subscription Integration Tests
//!
//! Change notifications of `AdsClient` against the mock device.
//!
//! ## Test Categories
//!
//! - `test_subscribe_*`: Registration and attributes
//! - `test_notify_*`: Dispatch and device-side coalescing
//! - `test_unsubscribe_*`: Cancellation
//! - `test_channel_*`: Channel-backed subscriptions

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use amelas_ads::{
    AdsClientConfig, AdsError, AdsReturnCode, NotificationHandle, TransmissionMode,
};
use amelas_tests::prelude::*;

const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Subscribe Tests
// =============================================================================

#[tokio::test]
async fn test_subscribe_registers_on_device() {
    let (client, device) = connected_client().await;

    let handle = client
        .subscribe(SymbolFixtures::SPEED, |_: f64| {}, Duration::from_millis(100))
        .await
        .unwrap();

    let attributes = device.notification_attributes(handle).unwrap();
    assert_eq!(attributes.length, 8);
    assert_eq!(attributes.cycle_time, Duration::from_millis(100));
    assert_eq!(attributes.mode, TransmissionMode::ServerOnChange);
    assert_eq!(
        device.notification_symbol_handle(handle),
        client.cached_handle(SymbolFixtures::SPEED)
    );
    assert_eq!(client.subscription_count(), 1);
}

#[tokio::test]
async fn test_subscribe_default_uses_configured_period() {
    let config = AdsClientConfig::builder()
        .default_cycle_time(Duration::from_millis(250))
        .max_delay(Duration::from_millis(20))
        .transmission_mode(TransmissionMode::ServerCycle)
        .build()
        .unwrap();
    let (client, device) = connected_client_with(config).await;

    let handle = client
        .subscribe_default(SymbolFixtures::COUNTER, |_: i32| {})
        .await
        .unwrap();

    let attributes = device.notification_attributes(handle).unwrap();
    assert_eq!(attributes.cycle_time, Duration::from_millis(250));
    assert_eq!(attributes.max_delay, Duration::from_millis(20));
    assert_eq!(attributes.mode, TransmissionMode::ServerCycle);
}

#[tokio::test]
async fn test_subscribe_reuses_cached_handle() {
    let (client, device) = connected_client().await;

    client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(device.resolve_count(), 1);
    assert_eq!(device.live_notifications(), 2);
}

#[tokio::test]
async fn test_subscribe_missing_symbol() {
    let (client, device) = connected_client().await;

    let err = client
        .subscribe(SymbolFixtures::MISSING, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, AdsError::Resolution { .. }));
    assert_eq!(device.add_notification_count(), 0);
    assert_eq!(client.subscription_count(), 0);
}

#[tokio::test]
async fn test_subscribe_device_rejection() {
    let (client, device) = connected_client().await;
    device.fail_add_notification(Some(AdsReturnCode::NO_MORE_NOTIFICATION_HANDLES));

    let err = client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, AdsError::Subscribe { .. }));
    assert_eq!(err.symbol(), Some(SymbolFixtures::PULSE));
    assert_eq!(client.subscription_count(), 0);
    assert!(client.cached_handle(SymbolFixtures::PULSE).is_some());
}

#[tokio::test]
async fn test_subscribe_wrong_value_size_rejected_by_device() {
    let (client, _device) = connected_client().await;

    let err = client
        .subscribe(SymbolFixtures::COUNTER, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert_eq!(err.device_code(), Some(AdsReturnCode::INVALID_SIZE));
}

#[tokio::test]
async fn test_subscribe_snapshot() {
    let (client, device) = connected_client().await;
    let handle = client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(100))
        .await
        .unwrap();

    device.set_value(SymbolFixtures::PULSE, true);

    let infos = client.subscriptions();
    assert_eq!(infos.len(), 1);
    let info = &infos[0];
    assert_eq!(info.handle, handle);
    assert_eq!(info.symbol, SymbolFixtures::PULSE);
    assert_eq!(info.value_type, "bool");
    assert_eq!(info.cycle_time, Duration::from_millis(100));
    assert_eq!(info.notifications, 1);
    assert!(info.last_notification.is_some());
}

// =============================================================================
// Notification Tests
// =============================================================================

#[tokio::test]
async fn test_notify_invokes_callback_once() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<bool>::new();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(device.set_value(SymbolFixtures::PULSE, true), 1);

    assert_eq!(recorder.values(), vec![true]);
}

#[tokio::test]
async fn test_notify_initial_value_sent_during_registration() {
    let (client, device) = connected_client().await;
    device.set_value(SymbolFixtures::COUNTER, 17i32);
    device.send_initial_notifications(true);
    let recorder = CallbackRecorder::<i32>::new();

    client
        .subscribe(SymbolFixtures::COUNTER, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();

    assert_eq!(recorder.values(), vec![17]);
    assert_eq!(client.notifications_dispatched(), 1);
    assert_eq!(client.notifications_dropped(), 0);
}

#[tokio::test]
async fn test_notify_within_period_is_coalesced() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<bool>::new();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(100))
        .await
        .unwrap();

    device.set_value(SymbolFixtures::PULSE, true);
    assert_eq!(device.set_value(SymbolFixtures::PULSE, false), 0);

    assert_eq!(recorder.values(), vec![true]);
}

#[tokio::test]
async fn test_notify_after_period_delivers_again() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<i32>::new();
    client
        .subscribe(SymbolFixtures::COUNTER, recorder.callback(), Duration::from_millis(20))
        .await
        .unwrap();

    device.set_value(SymbolFixtures::COUNTER, 1i32);
    tokio::time::sleep(Duration::from_millis(40)).await;
    device.set_value(SymbolFixtures::COUNTER, 2i32);

    assert_eq!(recorder.values(), vec![1, 2]);
}

#[tokio::test]
async fn test_notify_unchanged_value_not_delivered() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<i32>::new();
    client
        .subscribe(SymbolFixtures::COUNTER, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();

    assert_eq!(device.set_value(SymbolFixtures::COUNTER, 0i32), 0);
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn test_notify_triggered_by_own_write() {
    let (client, _device) = connected_client().await;
    let recorder = CallbackRecorder::<f64>::new();
    client
        .subscribe(SymbolFixtures::SPEED, recorder.callback(), Duration::from_millis(100))
        .await
        .unwrap();

    client.write(SymbolFixtures::SPEED, 1.5f64).await.unwrap();

    assert_eq!(recorder.values(), vec![1.5]);
    assert_eq!(client.notifications_dispatched(), 1);
}

#[tokio::test]
async fn test_notify_each_subscription_dispatched_separately() {
    let (client, device) = connected_client().await;
    let fast = CallbackRecorder::<bool>::new();
    let slow = CallbackRecorder::<bool>::new();
    client
        .subscribe(SymbolFixtures::PULSE, fast.callback(), Duration::from_millis(10))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::PULSE, slow.callback(), Duration::from_secs(60))
        .await
        .unwrap();

    device.set_value(SymbolFixtures::PULSE, true);
    tokio::time::sleep(Duration::from_millis(30)).await;
    device.set_value(SymbolFixtures::PULSE, false);

    assert_eq!(fast.values(), vec![true, false]);
    assert_eq!(slow.values(), vec![true]);
}

#[tokio::test]
async fn test_notify_from_other_thread() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<i32>::new();
    client
        .subscribe(SymbolFixtures::COUNTER, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();

    let plc = Arc::clone(&device);
    thread::spawn(move || {
        plc.set_value(SymbolFixtures::COUNTER, 77i32);
    })
    .join()
    .unwrap();

    assert!(recorder.wait_for(1, WAIT).await);
    assert_eq!(recorder.values(), vec![77]);
}

#[tokio::test]
async fn test_notify_malformed_payload_dropped() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<i32>::new();
    let handle = client
        .subscribe(SymbolFixtures::COUNTER, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();

    assert!(device.emit(handle, vec![1, 2]));

    assert_eq!(recorder.count(), 0);
    assert_eq!(client.notifications_dispatched(), 0);
    assert_eq!(client.notifications_dropped(), 1);
    assert_eq!(client.subscription_count(), 1);
}

// =============================================================================
// Unsubscribe Tests
// =============================================================================

#[tokio::test]
async fn test_unsubscribe_all_cancels_symbol() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<bool>::new();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::COUNTER, |_: i32| {}, Duration::from_millis(1))
        .await
        .unwrap();

    client.unsubscribe_all(SymbolFixtures::PULSE).await.unwrap();

    assert_eq!(device.live_notifications(), 1);
    assert_eq!(client.subscription_count(), 1);
    assert_eq!(device.set_value(SymbolFixtures::PULSE, true), 0);
    assert_eq!(recorder.count(), 0);
    assert!(client.cached_handle(SymbolFixtures::PULSE).is_some());
}

#[tokio::test]
async fn test_unsubscribe_all_twice_succeeds() {
    let (client, device) = connected_client().await;
    client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(1))
        .await
        .unwrap();

    client.unsubscribe_all(SymbolFixtures::PULSE).await.unwrap();
    client.unsubscribe_all(SymbolFixtures::PULSE).await.unwrap();

    assert_eq!(device.delete_notification_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_all_unresolved_symbol_does_no_io() {
    let (client, device) = connected_client().await;

    client.unsubscribe_all(SymbolFixtures::SPEED).await.unwrap();
    client.unsubscribe_all(SymbolFixtures::MISSING).await.unwrap();

    assert_eq!(device.total_calls(), 1);
}

#[tokio::test]
async fn test_unsubscribe_all_device_failure_still_stops_dispatch() {
    let (client, device) = connected_client().await;
    let recorder = CallbackRecorder::<bool>::new();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::PULSE, recorder.callback(), Duration::from_millis(1))
        .await
        .unwrap();
    device.fail_delete_notification(Some(AdsReturnCode::DEVICE_ERROR));

    let err = client.unsubscribe_all(SymbolFixtures::PULSE).await.unwrap_err();

    assert!(matches!(err, AdsError::Unsubscribe { .. }));
    assert_eq!(device.delete_notification_count(), 2);
    assert_eq!(client.subscription_count(), 0);

    device.set_value(SymbolFixtures::PULSE, true);
    assert_eq!(recorder.count(), 0);

    device.clear_faults();
    client.unsubscribe_all(SymbolFixtures::PULSE).await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_rejected_cancellations_retried_at_disconnect() {
    let (client, device) = connected_client().await;
    client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(1))
        .await
        .unwrap();
    let counter = client
        .subscribe(SymbolFixtures::COUNTER, |_: i32| {}, Duration::from_millis(1))
        .await
        .unwrap();
    device.fail_delete_notification(Some(AdsReturnCode::BUSY));

    assert!(client.unsubscribe_all(SymbolFixtures::PULSE).await.is_err());
    assert!(client.unsubscribe(counter).await.is_err());
    assert_eq!(client.subscription_count(), 0);
    assert_eq!(client.deferred_count(), 2);
    assert_eq!(device.live_notifications(), 2);

    device.clear_faults();
    client.disconnect().await.unwrap();

    assert_eq!(device.live_notifications(), 0);
    assert_eq!(device.delete_notification_count(), 4);
    assert_eq!(client.deferred_count(), 0);
}

#[tokio::test]
async fn test_unsubscribe_retries_rejected_cancellation() {
    let (client, device) = connected_client().await;
    let handle = client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(1))
        .await
        .unwrap();
    device.fail_delete_notification(Some(AdsReturnCode::BUSY));
    assert!(client.unsubscribe(handle).await.is_err());

    device.clear_faults();
    client.unsubscribe(handle).await.unwrap();

    assert_eq!(device.live_notifications(), 0);
    assert_eq!(client.deferred_count(), 0);
}

#[tokio::test]
async fn test_unsubscribe_single_handle() {
    let (client, device) = connected_client().await;
    let first = CallbackRecorder::<bool>::new();
    let second = CallbackRecorder::<bool>::new();
    let handle = client
        .subscribe(SymbolFixtures::PULSE, first.callback(), Duration::from_millis(1))
        .await
        .unwrap();
    client
        .subscribe(SymbolFixtures::PULSE, second.callback(), Duration::from_millis(1))
        .await
        .unwrap();

    client.unsubscribe(handle).await.unwrap();
    client.unsubscribe(handle).await.unwrap();
    device.set_value(SymbolFixtures::PULSE, true);

    assert_eq!(first.count(), 0);
    assert_eq!(second.values(), vec![true]);
    assert_eq!(device.delete_notification_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_from_callback() {
    let (client, device) = connected_client().await;
    let client = Arc::new(client);
    let handle_cell: Arc<OnceLock<NotificationHandle>> = Arc::new(OnceLock::new());
    let recorder = CallbackRecorder::<bool>::new();

    let runtime = tokio::runtime::Handle::current();
    let record = recorder.callback();
    let callback = {
        let client = Arc::clone(&client);
        let handle_cell = Arc::clone(&handle_cell);
        move |value: bool| {
            record(value);
            if let Some(handle) = handle_cell.get().copied() {
                let client = Arc::clone(&client);
                runtime.spawn(async move {
                    let _ = client.unsubscribe(handle).await;
                });
            }
        }
    };

    let handle = client
        .subscribe(SymbolFixtures::PULSE, callback, Duration::from_millis(1))
        .await
        .unwrap();
    handle_cell.set(handle).unwrap();

    client.write(SymbolFixtures::PULSE, true).await.unwrap();

    let deadline = tokio::time::Instant::now() + WAIT;
    while client.subscription_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(client.subscription_count(), 0);
    assert_eq!(device.live_notifications(), 0);
    assert_eq!(recorder.values(), vec![true]);
}

#[tokio::test]
async fn test_unsubscribe_by_invalidating_handle() {
    let (client, device) = connected_client().await;
    client
        .subscribe(SymbolFixtures::PULSE, |_: bool| {}, Duration::from_millis(1))
        .await
        .unwrap();

    client.invalidate_handle(SymbolFixtures::PULSE).await.unwrap();

    assert_eq!(device.live_notifications(), 0);
    assert_eq!(device.live_handles(), 0);
    assert_eq!(client.subscription_count(), 0);
}

// =============================================================================
// Channel Tests
// =============================================================================

#[tokio::test]
async fn test_channel_receives_values() {
    let (client, device) = connected_client().await;
    let (_handle, mut rx) = client
        .subscribe_channel::<i32>(SymbolFixtures::COUNTER, Duration::from_millis(1))
        .await
        .unwrap();

    device.set_value(SymbolFixtures::COUNTER, 5i32);

    let value = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(value, Some(5));
}

#[tokio::test]
async fn test_channel_closes_on_unsubscribe() {
    let (client, _device) = connected_client().await;
    let (handle, mut rx) = client
        .subscribe_channel::<bool>(SymbolFixtures::PULSE, Duration::from_millis(1))
        .await
        .unwrap();

    client.unsubscribe(handle).await.unwrap();

    let value = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(value, None);
}
