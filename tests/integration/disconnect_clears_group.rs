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
async fn disconnect_removes_group_membership_and_unsubscribes() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker.clone()).await;

    let conn = MockConnection::new("conn-1", protocol()).shared();
    manager.on_connected(conn.clone()).await.unwrap();
    manager.add_group("conn-1", "room").await.unwrap();

    let group_channel = hub_wire::channel_name("ChatHub", hub_wire::Address::Group("room"));
    assert_eq!(broker.subscriber_count(&group_channel).await, 1);

    manager.on_disconnected(conn.clone()).await;

    assert_eq!(broker.subscriber_count(&group_channel).await, 0);

    // A fan-out sent after disconnect must not reach the (now stale) mock.
    manager
        .send_group("room", "Announce", vec![])
        .await
        .unwrap();
    assert!(conn.received().await.is_empty());
}

#[tokio::test]
async fn disconnect_unsubscribes_connection_and_user_channels() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker.clone()).await;

    let conn = MockConnection::new("conn-1", protocol())
        .with_user_id("user-1")
        .shared();
    manager.on_connected(conn.clone()).await.unwrap();

    let c_channel = hub_wire::channel_name("ChatHub", hub_wire::Address::Connection("conn-1"));
    let u_channel = hub_wire::channel_name("ChatHub", hub_wire::Address::User("user-1"));
    assert_eq!(broker.subscriber_count(&c_channel).await, 1);
    assert_eq!(broker.subscriber_count(&u_channel).await, 1);

    manager.on_disconnected(conn).await;

    assert_eq!(broker.subscriber_count(&c_channel).await, 0);
    assert_eq!(broker.subscriber_count(&u_channel).await, 0);
}

#[tokio::test]
async fn disconnecting_one_user_connection_leaves_a_sibling_connection_subscribed() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker.clone()).await;

    let conn_a = MockConnection::new("conn-a", protocol())
        .with_user_id("user-1")
        .shared();
    let conn_b = MockConnection::new("conn-b", protocol())
        .with_user_id("user-1")
        .shared();
    manager.on_connected(conn_a.clone()).await.unwrap();
    manager.on_connected(conn_b.clone()).await.unwrap();

    manager.on_disconnected(conn_a).await;

    manager
        .send_user("user-1", "Announce", vec![])
        .await
        .unwrap();

    assert_eq!(conn_b.received().await.len(), 1);
}

#[tokio::test]
async fn disconnect_of_an_unknown_connection_is_a_no_op() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;
    let ghost = MockConnection::new("ghost", protocol()).shared();
    manager.on_disconnected(ghost).await;
}
