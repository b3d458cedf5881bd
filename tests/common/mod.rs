//! Shared utilities for integration testing.

use std::net::SocketAddr;

use manifold::config::ServerConfig;
use manifold::Server;
use tokio::task::JoinHandle;

/// Default configuration bound to an ephemeral port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Spawn a server and wait until its socket is up. Returns the bound
/// address and the serve task.
pub async fn spawn_server(server: Server) -> (SocketAddr, JoinHandle<()>) {
    let handle = server.handle();
    let task = tokio::spawn(async move {
        server.serve().await.expect("server exited with error");
    });
    let addr = handle.listening().await.expect("listener failed to start");
    (addr, task)
}

/// Client without connection pooling, so each request sees the server's
/// current accept state.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Client with pooling enabled, for tests that need an already-open
/// connection across a drain transition.
#[allow(dead_code)]
pub fn pooled_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
