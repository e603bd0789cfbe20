//! Session configuration

use crate::lifecycle::{ SessionRole, SUPPORTED_PROTOCOL_VERSIONS };
use crate::protocol::types::{ ClientCapabilities, Implementation, ServerCapabilities };

/// Capabilities advertised by one side; the variant also fixes the side's role
#[derive(Debug, Clone, PartialEq)]
pub enum Capabilities {
    Client(ClientCapabilities),
    Server(ServerCapabilities),
}

impl Capabilities {
    pub fn role(&self) -> SessionRole {
        match self {
            Capabilities::Client(_) => SessionRole::Client,
            Capabilities::Server(_) => SessionRole::Server,
        }
    }

    pub fn as_client(&self) -> Option<&ClientCapabilities> {
        match self {
            Capabilities::Client(caps) => Some(caps),
            Capabilities::Server(_) => None,
        }
    }

    pub fn as_server(&self) -> Option<&ServerCapabilities> {
        match self {
            Capabilities::Server(caps) => Some(caps),
            Capabilities::Client(_) => None,
        }
    }
}

impl From<ClientCapabilities> for Capabilities {
    fn from(caps: ClientCapabilities) -> Self {
        Capabilities::Client(caps)
    }
}

impl From<ServerCapabilities> for Capabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Capabilities::Server(caps)
    }
}

/// Local and (once negotiated) peer capabilities
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCapabilities {
    pub local: Capabilities,
    pub peer: Option<Capabilities>,
}

/// Configuration for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Our implementation info, sent during initialization
    pub info: Implementation,
    /// What we support; also decides whether we are client or server
    pub capabilities: Capabilities,
    /// Protocol versions we accept, newest first
    pub protocol_versions: Vec<String>,
    /// Instructions a server hands to the client in its initialize result
    pub instructions: Option<String>,
    /// Buffer for change notifications per subscriber
    pub change_buffer: usize,
    /// Buffer for progress updates per tracked request
    pub progress_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            info: Implementation::new("mcp-session", env!("CARGO_PKG_VERSION")),
            capabilities: Capabilities::Client(ClientCapabilities::default()),
            protocol_versions: SUPPORTED_PROTOCOL_VERSIONS.iter().map(|v| v.to_string()).collect(),
            instructions: None,
            change_buffer: 64,
            progress_buffer: 32,
        }
    }
}

impl SessionConfig {
    /// Defaults for the side that sends `initialize`
    pub fn client() -> Self {
        Self::default()
    }

    /// Defaults for the side that answers `initialize`
    pub fn server() -> Self {
        Self {
            capabilities: Capabilities::Server(ServerCapabilities::default()),
            ..Self::default()
        }
    }

    pub fn role(&self) -> SessionRole {
        self.capabilities.role()
    }

    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.info = Implementation::new(name, version);
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl Into<Capabilities>) -> Self {
        self.capabilities = capabilities.into();
        self
    }

    /// Replace the accepted protocol versions; the first one is preferred.
    /// An empty list keeps the current versions.
    pub fn with_protocol_versions<I, S>(mut self, versions: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        let versions: Vec<String> = versions.into_iter().map(Into::into).collect();
        if !versions.is_empty() {
            self.protocol_versions = versions;
        }
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_change_buffer(mut self, size: usize) -> Self {
        self.change_buffer = size.max(1);
        self
    }

    pub fn with_progress_buffer(mut self, size: usize) -> Self {
        self.progress_buffer = size.max(1);
        self
    }

    /// The version we ask for when we initiate
    pub fn preferred_protocol_version(&self) -> &str {
        self.protocol_versions
            .first()
            .map(String::as_str)
            .unwrap_or(crate::lifecycle::LATEST_PROTOCOL_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LATEST_PROTOCOL_VERSION;

    #[test]
    fn defaults_describe_a_client() {
        let config = SessionConfig::default();
        assert_eq!(config.role(), SessionRole::Client);
        assert_eq!(config.preferred_protocol_version(), LATEST_PROTOCOL_VERSION);
        assert_eq!(config.info.name, "mcp-session");
    }

    #[test]
    fn capabilities_decide_the_role() {
        let config = SessionConfig::client().with_capabilities(ServerCapabilities::default().with_tools(true));
        assert_eq!(config.role(), SessionRole::Server);
        assert!(config.capabilities.as_server().is_some_and(|c| c.tools_list_changed()));
        assert!(config.capabilities.as_client().is_none());
    }

    #[test]
    fn empty_version_list_is_ignored() {
        let config = SessionConfig::server()
            .with_protocol_versions(Vec::<String>::new())
            .with_protocol_versions(["2024-11-05"]);
        assert_eq!(config.protocol_versions, ["2024-11-05"]);
    }
}
