use hub_core::{HubLifetimeManager, ManagerConfig};
use hub_test_support::{InMemoryBroker, MockConnection};
use hub_wire::JsonHubProtocol;
use std::sync::Arc;
use std::time::Duration;

async fn manager(broker: Arc<InMemoryBroker>) -> HubLifetimeManager {
    let pascal: Arc<dyn hub_wire::HubProtocol> = Arc::new(JsonHubProtocol::new("json"));
    let camel: Arc<dyn hub_wire::HubProtocol> = Arc::new(JsonHubProtocol::camel_case("json-camel"));
    HubLifetimeManager::new(
        ManagerConfig::new("ChatHub").with_ack_timeout(Duration::from_millis(200)),
        broker,
        vec![pascal, camel],
    )
    .await
    .expect("manager should start up cleanly")
}

/// Two connections negotiated different `HubProtocol`s. A single `send_all`
/// is encoded once per protocol and each connection gets the bytes matching
/// its own negotiated casing -- not the sender's.
#[tokio::test]
async fn each_connection_receives_its_own_negotiated_protocols_casing() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    let pascal_conn = MockConnection::new("pascal", Arc::new(JsonHubProtocol::new("json"))).shared();
    let camel_conn =
        MockConnection::new("camel", Arc::new(JsonHubProtocol::camel_case("json-camel"))).shared();
    manager.on_connected(pascal_conn.clone()).await.unwrap();
    manager.on_connected(camel_conn.clone()).await.unwrap();

    manager
        .send_all("Notify", vec![serde_json::json!({ "TestProperty": "Foo" })])
        .await
        .unwrap();

    let pascal_messages = pascal_conn.received_json().await;
    let camel_messages = camel_conn.received_json().await;
    assert_eq!(pascal_messages.len(), 1);
    assert_eq!(camel_messages.len(), 1);

    let pascal_args = pascal_messages[0]["arguments"][0].as_object().unwrap();
    assert!(pascal_args.contains_key("TestProperty"));

    let camel_args = camel_messages[0]["arguments"][0].as_object().unwrap();
    assert!(camel_args.contains_key("testProperty"));
}

#[tokio::test]
async fn the_same_cache_serves_both_protocols_without_double_encoding_per_connection() {
    let broker = Arc::new(InMemoryBroker::new());
    let manager = manager(broker).await;

    // Three connections on the pascal protocol, two on camelCase -- the
    // cache should still only ever hold one entry per protocol *name*,
    // regardless of how many connections request it.
    let mut pascal_conns = vec![];
    for id in ["p1", "p2", "p3"] {
        let conn = MockConnection::new(id, Arc::new(JsonHubProtocol::new("json"))).shared();
        manager.on_connected(conn.clone()).await.unwrap();
        pascal_conns.push(conn);
    }
    let mut camel_conns = vec![];
    for id in ["c1", "c2"] {
        let conn = MockConnection::new(id, Arc::new(JsonHubProtocol::camel_case("json-camel"))).shared();
        manager.on_connected(conn.clone()).await.unwrap();
        camel_conns.push(conn);
    }

    manager
        .send_all("Notify", vec![serde_json::json!({ "TestProperty": 1 })])
        .await
        .unwrap();

    for conn in &pascal_conns {
        let messages = conn.received_json().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0]["arguments"][0]
            .as_object()
            .unwrap()
            .contains_key("TestProperty"));
    }
    for conn in &camel_conns {
        let messages = conn.received_json().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0]["arguments"][0]
            .as_object()
            .unwrap()
            .contains_key("testProperty"));
    }
}
