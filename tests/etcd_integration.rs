//! Registration loop against a mock etcd v2 keys API
//!
//! Runs on the real clock with a one second TTL, so refreshes happen every
//! 750ms.

use memcached_registrar::adapters::outbound::{EtcdConfig, EtcdConnector};
use memcached_registrar::{Endpoint, Registrar, ServiceRecord, ShutdownController, Weight};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const KEY_PATH: &str = "/v2/keys/services/memcached/203.0.113.7:32768";

fn registrar(server: &MockServer) -> Registrar {
    let endpoint = Endpoint {
        internal_addr: "127.0.0.1".to_string(),
        internal_port: 11211,
        public_addr: "203.0.113.7".to_string(),
        public_port: 32768,
    };
    let connector = EtcdConnector::new(
        EtcdConfig::new(server.uri()).request_timeout(Duration::from_secs(2)),
    );
    Registrar::new(
        Arc::new(connector),
        endpoint.registry_key("/services/memcached"),
        ServiceRecord::new(&endpoint, Weight::new(64)),
        Duration::from_secs(1),
    )
    .unwrap()
    .outage_backoff(Duration::from_millis(200))
}

async fn run_for(registrar: Registrar, duration: Duration) {
    let shutdown = ShutdownController::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        trigger.shutdown();
    });
    registrar.run(&shutdown).await;
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"etcdserver":"3.5.9","etcdcluster":"3.5.0"}"#),
        )
        .mount(server)
        .await;
}

fn body(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

fn is_publish(request: &Request) -> bool {
    request.method.as_str() == "PUT" && body(request).starts_with("value=")
}

fn is_refresh(request: &Request) -> bool {
    request.method.as_str() == "PUT" && body(request).contains("refresh=true")
}

fn is_delete(request: &Request) -> bool {
    request.method.as_str() == "DELETE"
}

#[tokio::test]
async fn test_publish_refresh_and_retract() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .and(body_string(
            "value=%7B%22host%22%3A%22203.0.113.7%22%2C%22port%22%3A32768%2C%22weight%22%3A64%7D&ttl=1",
        ))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"action":"set"}"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .and(body_string("ttl=1&refresh=true&prevExist=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"action":"update"}"#))
        .expect(2..)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(KEY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"action":"delete"}"#))
        .expect(1)
        .mount(&server)
        .await;

    run_for(registrar(&server), Duration::from_millis(1900)).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.first().map(|r| r.url.path()), Some("/version"));
    assert!(requests.last().is_some_and(is_delete));
    server.verify().await;
}

#[tokio::test]
async fn test_expired_key_is_published_again() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .and(body_string_contains("refresh=true"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"{"errorCode":100,"message":"Key not found","cause":"/services/memcached/203.0.113.7:32768","index":42}"#,
        ))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(KEY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    run_for(registrar(&server), Duration::from_millis(1200)).await;

    let requests = server.received_requests().await.unwrap();
    let versions = requests
        .iter()
        .filter(|r| r.url.path() == "/version")
        .count();
    assert_eq!(versions, 1, "a missing key must not force a reconnect");

    let puts: Vec<_> = requests.iter().filter(|r| r.method.as_str() == "PUT").collect();
    assert!(puts.len() >= 3);
    assert!(is_publish(puts[0]));
    assert!(is_refresh(puts[1]));
    assert!(is_publish(puts[2]));
}

#[tokio::test]
async fn test_outage_reconnects_before_publishing() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .and(body_string_contains("refresh=true"))
        .respond_with(ResponseTemplate::new(500).set_body_string("etcd is unwell"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(KEY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(KEY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Failed refresh at 750ms, reconnect after the 200ms backoff
    run_for(registrar(&server), Duration::from_millis(1300)).await;

    let requests = server.received_requests().await.unwrap();
    let kinds: Vec<&str> = requests
        .iter()
        .map(|r| {
            if r.url.path() == "/version" {
                "connect"
            } else if is_publish(r) {
                "publish"
            } else if is_refresh(r) {
                "refresh"
            } else if is_delete(r) {
                "delete"
            } else {
                "other"
            }
        })
        .collect();

    assert_eq!(
        kinds[..5],
        ["connect", "publish", "refresh", "connect", "publish"]
    );
    assert_eq!(kinds.last(), Some(&"delete"));
}

#[tokio::test]
async fn test_unreachable_registry_does_not_block_shutdown() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let endpoint = Endpoint {
        internal_addr: "127.0.0.1".to_string(),
        internal_port: 11211,
        public_addr: "203.0.113.7".to_string(),
        public_port: 32768,
    };
    let registrar = Registrar::new(
        Arc::new(EtcdConnector::new(EtcdConfig::new(uri))),
        endpoint.registry_key("/services/memcached"),
        ServiceRecord::new(&endpoint, Weight::new(1)),
        Duration::from_secs(60),
    )
    .unwrap();

    tokio::time::timeout(
        Duration::from_secs(10),
        run_for(registrar, Duration::from_millis(300)),
    )
    .await
    .expect("registrar did not stop");
}
