//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use thing_api::config::{AppConfig, RequestLogConfig};
use thing_api::observability::{LogRecord, MemorySink};
use thing_api::proto::{ThingRpcClient, VersionRpcClient};
use thing_api::store::{MemoryStore, ThingStore};
use thing_api::{rpc, InterceptorChain, ListeningServer, LoggingPipeline, Server};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

/// A server on an ephemeral loopback port whose request log goes to memory.
pub struct TestServer {
    pub running: ListeningServer,
    pub sink: Arc<MemorySink>,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        if self.running.is_tls() {
            format!("https://localhost:{}", self.running.local_addr().port())
        } else {
            format!("http://{}", self.running.local_addr())
        }
    }

    /// HTTP client that trusts the server certificate when TLS is on.
    pub fn http_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder();
        if let Some(anchor) = self.running.trust_anchor() {
            builder = builder
                .add_root_certificate(reqwest::Certificate::from_pem(anchor.leaf_pem().as_bytes()).unwrap())
                .resolve("localhost", self.running.local_addr());
        }
        builder.build().unwrap()
    }

    pub async fn channel(&self) -> Channel {
        let addr = self.running.local_addr();
        let endpoint = match self.running.trust_anchor() {
            Some(anchor) => Endpoint::from_shared(format!("https://{addr}"))
                .unwrap()
                .tls_config(
                    ClientTlsConfig::new()
                        .ca_certificate(Certificate::from_pem(anchor.leaf_pem()))
                        .domain_name(anchor.common_name()),
                )
                .unwrap(),
            None => Endpoint::from_shared(format!("http://{addr}")).unwrap(),
        };
        endpoint.connect().await.unwrap()
    }

    pub async fn thing_client(&self) -> ThingRpcClient<Channel> {
        ThingRpcClient::new(self.channel().await)
    }

    pub async fn version_client(&self) -> VersionRpcClient<Channel> {
        VersionRpcClient::new(self.channel().await)
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.sink.records()
    }

    /// Records appear after the response is written; poll briefly for them.
    pub async fn wait_for_records(&self, count: usize) -> Vec<LogRecord> {
        for _ in 0..100 {
            let records = self.sink.records();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.sink.records()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.shutdown();
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

/// Start the full API (health, things, version, gateway) with the given
/// config adjustments.
pub async fn start_server(configure: impl FnOnce(&mut AppConfig)) -> TestServer {
    start_server_with_store(configure, Arc::new(MemoryStore::new())).await
}

/// Like [`start_server`], backed by the given store.
pub async fn start_server_with_store(configure: impl FnOnce(&mut AppConfig), store: Arc<dyn ThingStore>) -> TestServer {
    thing_api::net::tls::install_crypto_provider();

    let mut config = test_config();
    configure(&mut config);

    let sink = Arc::new(MemorySink::new());
    let chain = LoggingPipeline::with_sink(&config.request_log, sink.clone())
        .with_body_limit(config.http.max_body_size)
        .install(InterceptorChain::new());
    let mut server = Server::new(&config, chain);
    rpc::setup_routes(&mut server, store);

    TestServer {
        running: server.listen_and_serve().await.unwrap(),
        sink,
    }
}

pub fn log_bodies(config: &mut AppConfig) {
    config.request_log = RequestLogConfig {
        log_request_body: true,
        ..RequestLogConfig::default()
    };
}
