//! Shared harness for gateway integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use gatekeeper::config::{GatewayConfig, PrincipalSeed};
use gatekeeper::gateway::Gateway;
use gatekeeper::http::GatewayServer;
use gatekeeper::session::auth::{hash_secret, InMemoryCounter, InMemoryDirectory};
use gatekeeper::Role;

/// A config with noisy bits disabled and a generous API window, so tests
/// only trip the limits they mean to.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.audit.enabled = false;
    config.observability.metrics_enabled = false;
    config.rate_limit.api.max_attempts = 1000;
    config
}

/// Seed a principal with a freshly hashed secret.
pub fn seed(id: u64, username: &str, email: &str, role: Role, secret: &str) -> PrincipalSeed {
    PrincipalSeed {
        id,
        username: username.to_string(),
        email: email.to_string(),
        role,
        secret_hash: hash_secret(secret).unwrap(),
        display_name: username.to_string(),
    }
}

/// Spawn a gateway server on an ephemeral port, returning its address.
pub async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let directory = Arc::new(InMemoryDirectory::from_seeds(&config.auth.principals));
    let counters = Arc::new(InMemoryCounter::new());
    let gateway = Arc::new(Gateway::new(config, directory, counters.clone()).unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = GatewayServer::new(gateway, counters);
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    addr
}

/// A client with a cookie jar, no redirect following, and no proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// POST /auth/login negotiating JSON.
pub async fn login(
    client: &reqwest::Client,
    addr: SocketAddr,
    identifier: &str,
    secret: &str,
    role: &str,
) -> reqwest::Response {
    client
        .post(format!("http://{}/auth/login", addr))
        .header("Accept", "application/json")
        .json(&serde_json::json!({
            "identifier": identifier,
            "secret": secret,
            "role": role,
        }))
        .send()
        .await
        .unwrap()
}

/// GET /auth/token for the current session.
pub async fn fetch_token(client: &reqwest::Client, addr: SocketAddr) -> String {
    let body: serde_json::Value = client
        .get(format!("http://{}/auth/token", addr))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["token"].as_str().unwrap().to_string()
}
