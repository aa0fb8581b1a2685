use std::sync::{Arc, Mutex};

use uponor_x265::{AvailabilityState, JnapClient, StateProxy, StateUpdate};

/// Run with: UPONOR_HOST=<controller ip> cargo test --test integration -- --ignored
/// Read-only: polls a real controller and never writes.
#[tokio::test]
#[ignore]
async fn poll_real_controller() {
    let host = std::env::var("UPONOR_HOST").expect("UPONOR_HOST must be set");

    let updates: Arc<Mutex<Vec<StateUpdate>>> = Arc::new(Mutex::new(vec![]));
    let updates_clone = updates.clone();
    let client = JnapClient::builder(host).build().expect("client should build");
    let mut proxy = StateProxy::builder(client)
        .on_update(move |update| {
            updates_clone.lock().unwrap().push(update.clone());
        })
        .build();

    assert_eq!(proxy.update().await, AvailabilityState::Healthy);

    let snapshot = proxy.snapshot();
    let zones = snapshot.active_zones();
    assert!(!zones.is_empty(), "should discover at least one zone");
    for zone in &zones {
        let state = snapshot.zone_state(zone);
        println!("{zone}: {state:?}");
        assert!(state.min_setpoint.is_some(), "{zone} has no lower bound");
        assert!(state.max_setpoint.is_some(), "{zone} has no upper bound");
    }

    let captured = updates.lock().unwrap();
    assert!(
        matches!(captured.as_slice(), [StateUpdate::Polled { changes }] if !changes.is_empty()),
        "first poll should report every variable as new"
    );
}
