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

#[tokio::test]
async fn one_connections_write_failure_does_not_block_delivery_to_others() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let healthy = MockConnection::new("healthy", protocol()).shared();
    let broken = MockConnection::new("broken", protocol()).shared();
    broken.set_failing(true);

    manager.on_connected(healthy.clone()).await.unwrap();
    manager.on_connected(broken.clone()).await.unwrap();

    let result = manager.send_all("Notify", vec![serde_json::json!("hi")]).await;

    assert!(result.is_ok(), "a per-connection write failure must not surface to the caller");
    assert_eq!(healthy.received().await.len(), 1);
    assert!(broken.received().await.is_empty());
}

#[tokio::test]
async fn write_failure_isolation_also_holds_within_a_group() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let healthy = MockConnection::new("healthy", protocol()).shared();
    let broken = MockConnection::new("broken", protocol()).shared();
    broken.set_failing(true);

    manager.on_connected(healthy.clone()).await.unwrap();
    manager.on_connected(broken.clone()).await.unwrap();
    manager.add_group("healthy", "room").await.unwrap();
    manager.add_group("broken", "room").await.unwrap();

    manager
        .send_group("room", "Announce", vec![])
        .await
        .unwrap();

    assert_eq!(healthy.received().await.len(), 1);
    assert!(broken.received().await.is_empty());
}

#[tokio::test]
async fn a_connection_recovers_once_failing_is_cleared() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let conn = MockConnection::new("conn-1", protocol()).shared();
    conn.set_failing(true);
    manager.on_connected(conn.clone()).await.unwrap();

    manager.send_all("Notify", vec![]).await.unwrap();
    assert!(conn.received().await.is_empty());

    conn.set_failing(false);
    manager.send_all("Notify", vec![]).await.unwrap();
    assert_eq!(conn.received().await.len(), 1);
}
