//! TLS listener tests: development certificate, certificate files, and the
//! gateway dialing back over TLS.

mod common;

use std::path::PathBuf;

use serde_json::{json, Value};
use thing_api::net::tls;
use thing_api::proto::Thing;
use thing_api::{InterceptorChain, Server, ServerError};

fn dev_tls(config: &mut thing_api::AppConfig) {
    config.listener.tls = true;
    config.listener.devcert = true;
}

#[tokio::test]
async fn dev_certificate_serves_both_protocols() {
    let server = common::start_server(dev_tls).await;
    assert!(server.running.is_tls());
    assert_eq!(server.running.trust_anchor().unwrap().common_name(), "localhost");

    let mut client = server.thing_client().await;
    let id = client
        .thing_save(Thing {
            id: String::new(),
            name: "secure".into(),
        })
        .await
        .unwrap()
        .into_inner()
        .id;

    // Served by the gateway, which dials back over TLS.
    let thing: Value = server
        .http_client()
        .get(format!("{}/api/things/{id}", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(thing, json!({"id": id, "name": "secure"}));
}

#[tokio::test]
async fn plaintext_client_is_rejected_by_tls_listener() {
    let server = common::start_server(dev_tls).await;
    let result = reqwest::Client::new()
        .get(format!("http://{}/health", server.running.local_addr()))
        .send()
        .await;
    assert!(result.is_err() || !result.unwrap().status().is_success());
}

fn write_pem_files(dir: &str) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("{dir}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let certificate = tls::generate_dev_certificate().unwrap();
    let certfile = dir.join("server.crt");
    let keyfile = dir.join("server.key");
    std::fs::write(&certfile, certificate.leaf_pem()).unwrap();
    std::fs::write(
        &keyfile,
        pem::encode(&pem::Pem::new("PRIVATE KEY", certificate.key().secret_der().to_vec())),
    )
    .unwrap();
    (certfile, keyfile)
}

#[tokio::test]
async fn certificate_files_are_loaded() {
    let (certfile, keyfile) = write_pem_files("thing-api-tls");
    let server = common::start_server(move |config| {
        config.listener.tls = true;
        config.listener.certfile = certfile;
        config.listener.keyfile = keyfile;
    })
    .await;

    let response = server
        .http_client()
        .get(format!("{}/version", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn missing_certificate_files_fail_startup() {
    tls::install_crypto_provider();
    let mut config = common::test_config();
    config.listener.tls = true;
    config.listener.certfile = PathBuf::from("/nonexistent/server.crt");
    config.listener.keyfile = PathBuf::from("/nonexistent/server.key");

    let result = Server::new(&config, InterceptorChain::new()).listen_and_serve().await;
    assert!(matches!(result, Err(ServerError::Tls(_))));
}
