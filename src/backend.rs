//! Backend registry
//!
//! Maps a string key to a factory that opens a [`Connection`]. Callers pick a
//! backend by name and hand the connection to a client or server builder.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{ debug, info, warn };

use crate::errors::Error;
use crate::transport::{ stdio, Connection };

/// Opens a fresh connection each time it is called
pub type BackendFactory = Arc<dyn (Fn() -> BoxFuture<'static, Result<Connection, Error>>) + Send + Sync>;

/// Configuration for a backend launched as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessBackend {
    pub command: String,
    pub args: Vec<String>,
    pub env: Option<HashMap<String, String>>,
}

impl ProcessBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.get_or_insert_with(HashMap::new).insert(key.into(), value.into());
        self
    }

    /// Spawn the process and connect to its stdin/stdout.
    ///
    /// The child is reaped on a background task once it exits.
    pub fn connect(&self) -> Result<Connection, Error> {
        let (connection, mut child) = stdio::spawn(&self.command, &self.args, self.env.as_ref())?;
        let command = self.command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Backend process {} exited with {}", command, status),
                Err(e) => warn!("Failed to wait for backend process {}: {}", command, e),
            }
        });
        Ok(connection)
    }
}

/// Named connection factories
#[derive(Default)]
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, replacing any previous one
    pub async fn register<F, Fut>(&self, key: impl Into<String>, factory: F)
        where F: Fn() -> Fut + Send + Sync + 'static, Fut: std::future::Future<Output = Result<Connection, Error>> + Send + 'static
    {
        let key = key.into();
        info!("Registering backend {}", key);
        let factory: BackendFactory = Arc::new(move || factory().boxed());
        self.factories.write().await.insert(key, factory);
    }

    /// Register a child-process backend under `key`
    pub async fn register_process(&self, key: impl Into<String>, backend: ProcessBackend) {
        self.register(key, move || {
            let outcome = backend.connect();
            async move { outcome }
        }).await;
    }

    pub async fn unregister(&self, key: &str) -> bool {
        self.factories.write().await.remove(key).is_some()
    }

    /// Registered keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.factories.read().await.contains_key(key)
    }

    /// Open a connection to the backend registered under `key`
    pub async fn connect(&self, key: &str) -> Result<Connection, Error> {
        let factory = self.factories
            .read().await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown backend: {}", key)))?;
        debug!("Connecting to backend {}", key);
        factory().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientBuilder;
    use crate::server::ServerBuilder;
    use crate::transport::channel;

    #[tokio::test]
    async fn connects_by_key() {
        let registry = BackendRegistry::new();
        registry.register("memory", || async {
            let (client_end, server_end) = channel::pair(8);
            let (_server, _) = ServerBuilder::new().with_info("in-memory", "0.0.1").build(server_end);
            Ok(client_end)
        }).await;
        registry.register_process("external", ProcessBackend::new("some-mcp-server").with_args(["--stdio"])).await;

        assert_eq!(registry.keys().await, ["external", "memory"]);

        let (client, _) = ClientBuilder::new().build(registry.connect("memory").await.unwrap());
        let result = client.initialize().await.unwrap();
        assert_eq!(result.server_info.name, "in-memory");
    }

    #[tokio::test]
    async fn unknown_key_is_a_transport_error() {
        let registry = BackendRegistry::new();
        assert!(matches!(registry.connect("nope").await, Err(Error::Transport(_))));
        assert!(!registry.unregister("nope").await);
    }

    #[tokio::test]
    async fn missing_executable_fails_to_connect() {
        let registry = BackendRegistry::new();
        registry.register_process("ghost", ProcessBackend::new("/definitely/not/a/real/binary")).await;
        assert!(matches!(registry.connect("ghost").await, Err(Error::Transport(_))));
    }
}
