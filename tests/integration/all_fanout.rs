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
        ManagerConfig::new("TestHub").with_ack_timeout(Duration::from_millis(200)),
        broker,
        vec![protocol()],
    )
    .await
    .expect("manager should start up cleanly")
}

#[tokio::test]
async fn send_all_reaches_every_connected_client() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let a = MockConnection::new("a", protocol()).shared();
    let b = MockConnection::new("b", protocol()).shared();
    manager.on_connected(a.clone()).await.unwrap();
    manager.on_connected(b.clone()).await.unwrap();

    manager
        .send_all("Notify", vec![serde_json::json!("hello")])
        .await
        .unwrap();

    assert_eq!(a.received().await.len(), 1);
    assert_eq!(b.received().await.len(), 1);
}

#[tokio::test]
async fn send_all_except_skips_the_excluded_connection() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let a = MockConnection::new("a", protocol()).shared();
    let b = MockConnection::new("b", protocol()).shared();
    manager.on_connected(a.clone()).await.unwrap();
    manager.on_connected(b.clone()).await.unwrap();

    manager
        .send_all_except("Notify", vec![], &["a".to_owned()])
        .await
        .unwrap();

    assert!(a.received().await.is_empty());
    assert_eq!(b.received().await.len(), 1);
}

#[tokio::test]
async fn send_connection_short_circuits_the_broker_for_a_local_target() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker.clone()).await;

    let a = MockConnection::new("a", protocol()).shared();
    manager.on_connected(a.clone()).await.unwrap();

    manager
        .send_connection("a", "Notify", vec![serde_json::json!(1)])
        .await
        .unwrap();

    assert_eq!(a.received().await.len(), 1);
    // The connection channel was subscribed (so remote servers can still
    // reach it), but this local send never touched the broker.
    let channel = hub_wire::channel_name("TestHub", hub_wire::Address::Connection("a"));
    assert_eq!(broker.subscriber_count(&channel).await, 1);
}

#[tokio::test]
async fn send_connection_falls_back_to_the_broker_for_a_remote_target() {
    let broker = Arc::new(InMemoryBroker::new());
    let sender = manager(broker.clone()).await;
    let receiver = manager(broker).await;

    let a = MockConnection::new("a", protocol()).shared();
    receiver.on_connected(a.clone()).await.unwrap();

    sender
        .send_connection("a", "Notify", vec![serde_json::json!("remote")])
        .await
        .unwrap();

    assert_eq!(a.received().await.len(), 1);
}
