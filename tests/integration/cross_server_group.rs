use hub_core::{HubLifetimeManager, ManagerConfig};
use hub_test_support::{InMemoryBroker, MockConnection};
use hub_wire::JsonHubProtocol;
use std::sync::Arc;
use std::time::Duration;

fn protocol() -> Arc<dyn hub_wire::HubProtocol> {
    Arc::new(JsonHubProtocol::new("json"))
}

async fn manager(broker: Arc<InMemoryBroker>) -> HubLifetimeManager {
    HubLifetimeManager::new(
        ManagerConfig::new("ChatHub").with_ack_timeout(Duration::from_millis(200)),
        broker,
        vec![protocol()],
    )
    .await
    .expect("manager should start up cleanly")
}

/// A connection attached to server A joins a group via a group-management
/// command forwarded from server B, and then receives a `send_group` fan-out
/// that server B also only reaches over the broker.
#[tokio::test]
async fn add_group_from_a_remote_server_is_applied_and_acked() {
    let broker = Arc::new(InMemoryBroker::new());
    let server_a = manager(broker.clone()).await;
    let server_b = manager(broker).await;

    let conn = MockConnection::new("conn-1", protocol()).shared();
    server_a.on_connected(conn.clone()).await.unwrap();

    // conn-1 is not local to server_b, so this forwards a GroupCommand over
    // the `gm` channel and waits for server_a's ack.
    server_b.add_group("conn-1", "room").await.unwrap();

    server_b
        .send_group("room", "Announce", vec![serde_json::json!("hi")])
        .await
        .unwrap();

    assert_eq!(conn.received().await.len(), 1);
}

#[tokio::test]
async fn add_group_for_an_unknown_connection_times_out() {
    let broker = Arc::new(InMemoryBroker::new());
    let server_a = manager(broker.clone()).await;
    let server_b = manager(broker).await;
    let _ = &server_a;

    let err = server_b.add_group("ghost", "room").await.unwrap_err();
    assert!(matches!(err, hub_core::ManagerError::AckTimeout(_)));
}

#[tokio::test]
async fn group_membership_is_idempotent() {
    let broker = Arc::new(InMemoryBroker::new());
    let server_a = manager(broker).await;

    let conn = MockConnection::new("conn-1", protocol()).shared();
    server_a.on_connected(conn.clone()).await.unwrap();

    server_a.add_group("conn-1", "room").await.unwrap();
    server_a.add_group("conn-1", "room").await.unwrap();

    server_a
        .send_group("room", "Announce", vec![])
        .await
        .unwrap();

    // A duplicate join must not register a second broker subscription, so
    // the fan-out still reaches the connection exactly once.
    assert_eq!(conn.received().await.len(), 1);
}
