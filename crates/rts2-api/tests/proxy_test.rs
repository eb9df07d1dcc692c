#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceProxy` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rts2_api::{ClientConfig, DeviceProxy, DeviceType, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DeviceProxy) {
    let server = MockServer::start().await;
    let config = ClientConfig::new(server.uri()).with_credentials("petr", "secret");
    let proxy = DeviceProxy::new(&config).unwrap();
    (server, proxy)
}

async fn mount_device_list(server: &MockServer, names: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(names)))
        .mount(server)
        .await;
}

async fn mount_device_state(server: &MockServer, name: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/get"))
        .and(query_param("d", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ── Refresh / cache round-trip ──────────────────────────────────────

#[tokio::test]
async fn full_refresh_round_trips_values() {
    let (server, proxy) = setup().await;

    mount_device_list(&server, &["T0", "C0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 12.5, "dec": -45.0}, "state": 2})).await;
    mount_device_state(&server, "C0", json!({"d": {"exposure": 30.0}, "state": 0})).await;

    proxy.refresh(None).await.unwrap();

    assert_eq!(proxy.get_value("T0", "ra", false).await.unwrap(), json!(12.5));
    assert_eq!(proxy.get_value("T0", "dec", false).await.unwrap(), json!(-45.0));
    assert_eq!(proxy.get_value("C0", "exposure", false).await.unwrap(), json!(30.0));

    let mut names = proxy.device_names();
    names.sort();
    assert_eq!(names, vec!["C0".to_owned(), "T0".to_owned()]);
}

#[tokio::test]
async fn full_refresh_prunes_departed_devices() {
    let (server, proxy) = setup().await;

    mount_device_list(&server, &["T0", "C0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 1.0}, "state": 0})).await;
    mount_device_state(&server, "C0", json!({"d": {"exposure": 1.0}, "state": 0})).await;
    proxy.refresh(None).await.unwrap();

    server.reset().await;
    mount_device_list(&server, &["T0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 2.0}, "state": 0})).await;
    proxy.refresh(None).await.unwrap();

    assert_eq!(proxy.device_names(), vec!["T0".to_owned()]);
    assert_eq!(proxy.cached_value("T0", "ra"), Some(json!(2.0)));
}

#[tokio::test]
async fn failed_full_refresh_keeps_previous_cache() {
    let (server, proxy) = setup().await;

    mount_device_list(&server, &["T0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 12.5}, "state": 2})).await;
    proxy.refresh(None).await.unwrap();

    // Second refresh fails halfway: the device list now names a device
    // whose state fetch is rejected.
    server.reset().await;
    mount_device_list(&server, &["T0", "W0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 99.0}, "state": 2})).await;
    Mock::given(method("GET"))
        .and(path("/api/get"))
        .and(query_param("d", "W0"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "bad device"})))
        .mount(&server)
        .await;

    let result = proxy.refresh(None).await;
    assert!(matches!(result, Err(Error::ServerRejected { .. })));

    // Nothing from the failed cycle was committed.
    assert_eq!(proxy.cached_value("T0", "ra"), Some(json!(12.5)));
    assert_eq!(proxy.device_names(), vec!["T0".to_owned()]);
}

#[tokio::test]
async fn single_device_refresh_leaves_others_untouched() {
    let (server, proxy) = setup().await;

    mount_device_list(&server, &["T0", "C0"]).await;
    mount_device_state(&server, "T0", json!({"d": {"ra": 1.0}, "state": 0})).await;
    mount_device_state(&server, "C0", json!({"d": {"exposure": 1.0}, "state": 0})).await;
    proxy.refresh(None).await.unwrap();

    server.reset().await;
    mount_device_state(&server, "C0", json!({"d": {"exposure": 60.0}, "state": 1})).await;
    proxy.refresh(Some("C0")).await.unwrap();

    assert_eq!(proxy.cached_value("C0", "exposure"), Some(json!(60.0)));
    assert_eq!(proxy.cached_value("T0", "ra"), Some(json!(1.0)));
}

// ── Value lookups ───────────────────────────────────────────────────

#[tokio::test]
async fn get_value_miss_without_refresh_fails() {
    let (_server, proxy) = setup().await;

    let result = proxy.get_value("T0", "ra", false).await;
    assert!(result.as_ref().is_err_and(Error::is_not_found), "got: {result:?}");
}

#[tokio::test]
async fn get_value_miss_triggers_exactly_one_refresh() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/get"))
        .and(query_param("d", "T0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"d": {"ra": 12.5}, "state": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let value = proxy.get_value("T0", "ra", true).await.unwrap();
    assert_eq!(value, json!(12.5));
}

#[tokio::test]
async fn get_value_still_missing_after_refresh_fails() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/get"))
        .and(query_param("d", "T0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"d": {"dec": -45.0}, "state": 2})))
        .expect(1)
        .mount(&server)
        .await;

    // One refresh, one retried lookup, no loop.
    let result = proxy.get_value("T0", "ra", true).await;
    assert!(result.as_ref().is_err_and(Error::is_not_found), "got: {result:?}");
}

#[tokio::test]
async fn get_value_f64_rejects_non_numbers() {
    let (server, proxy) = setup().await;

    mount_device_state(&server, "T0", json!({"d": {"model": "gem"}, "state": 0})).await;
    proxy.refresh(Some("T0")).await.unwrap();

    let result = proxy.get_value_f64("T0", "model", false).await;
    assert!(matches!(result, Err(Error::Decode { .. })), "got: {result:?}");
}

#[tokio::test]
async fn get_state_always_fetches() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/get"))
        .and(query_param("d", "T0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"d": {}, "state": 3})))
        .expect(2)
        .mount(&server)
        .await;

    assert_eq!(proxy.get_state("T0").await.unwrap(), json!(3));
    assert_eq!(proxy.get_state("T0").await.unwrap(), json!(3));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn set_value_sends_but_does_not_cache() {
    let (server, proxy) = setup().await;

    mount_device_state(&server, "C0", json!({"d": {"exposure": 30.0}, "state": 0})).await;
    proxy.refresh(Some("C0")).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/set"))
        .and(query_param("d", "C0"))
        .and(query_param("n", "exposure"))
        .and(query_param("v", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ret": 0})))
        .expect(1)
        .mount(&server)
        .await;

    proxy.set_value("C0", "exposure", 60, None).await.unwrap();

    // The cache still holds the pre-set value.
    assert_eq!(proxy.cached_value("C0", "exposure"), Some(json!(30.0)));
}

#[tokio::test]
async fn set_value_with_queue_adds_async_param() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/set"))
        .and(query_param("d", "C0"))
        .and(query_param("n", "SHUTTER"))
        .and(query_param("v", "LIGHT"))
        .and(query_param("async", "exec"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ret": 0})))
        .expect(1)
        .mount(&server)
        .await;

    proxy.set_value("C0", "SHUTTER", "LIGHT", Some("exec")).await.unwrap();
}

#[tokio::test]
async fn set_values_namespaces_keys_with_device() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/mset"))
        .and(query_param("T0.ra", "1"))
        .and(query_param("T0.dec", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ret": 0})))
        .expect(1)
        .mount(&server)
        .await;

    proxy
        .set_values(&[("ra", "1".to_owned()), ("dec", "2".to_owned())], Some("T0"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn set_values_without_device_sends_keys_unchanged() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/mset"))
        .and(query_param("T0.ra", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ret": 0})))
        .expect(1)
        .mount(&server)
        .await;

    proxy
        .set_values(&[("T0.ra", "1".to_owned())], None, None)
        .await
        .unwrap();
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn execute_command_overwrites_cache_entry() {
    let (server, proxy) = setup().await;

    mount_device_state(&server, "T0", json!({"d": {"ra": 1.0, "tracking": 1}, "state": 2})).await;
    proxy.refresh(Some("T0")).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/cmd"))
        .and(query_param("d", "T0"))
        .and(query_param("c", "park"))
        .and(query_param("e", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"d": {"ra": 0.0}, "ret": 0, "state": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ret = proxy.execute_command("T0", "park").await.unwrap();
    assert_eq!(ret, json!(0));

    // The entry is exactly the reply's `d` map: prior keys are gone.
    let cached = proxy.cached_device("T0").unwrap();
    assert_eq!(cached.values, json!({"ra": 0.0}).as_object().unwrap().clone());
    assert_eq!(cached.state, json!(1));
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn get_devices_by_type_passes_through() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devbytype"))
        .and(query_param("t", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["T0", "T1"])))
        .expect(1)
        .mount(&server)
        .await;

    let mounts = proxy.get_devices_by_type(DeviceType::Mount).await.unwrap();
    assert_eq!(mounts, vec!["T0".to_owned(), "T1".to_owned()]);
    assert!(proxy.device_names().is_empty());
}

// ── Transport / error surface ───────────────────────────────────────

#[tokio::test]
async fn requests_carry_basic_auth_header() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("Authorization", "Basic cGV0cjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    proxy.refresh(None).await.unwrap();
}

#[tokio::test]
async fn server_error_field_surfaces_as_rejection() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/get"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "bad device"})))
        .mount(&server)
        .await;

    let result = proxy.get_state("nonexistent").await;
    match result {
        Err(Error::ServerRejected { ref message }) => assert_eq!(message, "bad device"),
        other => panic!("expected ServerRejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_surfaces_as_decode_error() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = proxy.refresh(None).await;
    assert!(matches!(result, Err(Error::Decode { .. })), "got: {result:?}");
}

#[tokio::test]
async fn explicit_connection_bypasses_shared_lock() {
    let (server, proxy) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["T0"])))
        .mount(&server)
        .await;

    let conn = proxy.client().new_connection().unwrap();
    let value = proxy
        .client()
        .fetch_json_with(&conn, "/api/devices", &[] as &[(&str, &str)])
        .await
        .unwrap();
    assert_eq!(value, json!(["T0"]));
}
