//! MCP Client
//!
//! Typed client API over a [`Session`]. [`ClientBuilder`] assembles the
//! session config and starts reading from the connection; [`ClientSession`]
//! wraps each server feature in a method that checks the negotiated server
//! capabilities before sending.

use std::collections::HashMap;
use std::future::Future;

use serde_json::{ Map, Value };
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::Error;
use crate::protocol::one_of::OneOf;
use crate::protocol::pagination::{ collect_pages, Cursor, PaginatedParams };
use crate::protocol::types::*;
use crate::protocol::unions::Reference;
use crate::session::{
    ChangeEvent,
    Negotiated,
    PendingCall,
    ProgressStream,
    RequestContext,
    Session,
    SessionConfig,
    Subscription,
};
use crate::transport::Connection;

/// Builder for a [`ClientSession`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: SessionConfig,
    capabilities: ClientCapabilities,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::client(),
            capabilities: ClientCapabilities::default(),
        }
    }

    /// Set the client name and version sent in `initialize`
    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config = self.config.with_info(name, version);
        self
    }

    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Advertise `roots`, optionally with list-changed notifications
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.capabilities = self.capabilities.with_roots(list_changed);
        self
    }

    /// Advertise `sampling`
    pub fn with_sampling(mut self) -> Self {
        self.capabilities = self.capabilities.with_sampling();
        self
    }

    /// Protocol versions to accept, newest first
    pub fn with_protocol_versions<I, S>(mut self, versions: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.config = self.config.with_protocol_versions(versions);
        self
    }

    pub fn with_change_buffer(mut self, size: usize) -> Self {
        self.config = self.config.with_change_buffer(size);
        self
    }

    /// Start reading from `connection`. Call [`ClientSession::initialize`] next.
    pub fn build(self, connection: Connection) -> (ClientSession, JoinHandle<()>) {
        let config = self.config.with_capabilities(self.capabilities);
        let (session, reader) = Session::connect(connection, config);
        (ClientSession { session }, reader)
    }
}

/// The client side of an MCP conversation
#[derive(Debug, Clone)]
pub struct ClientSession {
    session: Session,
}

impl ClientSession {
    /// The underlying session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the handshake; the session is Ready afterwards
    pub async fn initialize(&self) -> Result<InitializeResult, Error> {
        let result = self.session.initialize().await?;
        debug!("Connected to {} {}", result.server_info.name, result.server_info.version);
        Ok(result)
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.session.negotiated()
    }

    /// Capabilities the server advertised, once initialized
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.session.negotiated().and_then(|n| n.peer_capabilities.as_server().cloned())
    }

    /// Fail early when the server did not advertise a feature.
    ///
    /// Before initialization nothing is known, and the lifecycle check in
    /// [`Session::send`] reports the real problem.
    fn require(&self, feature: &str, supported: impl Fn(&ServerCapabilities) -> bool) -> Result<(), Error> {
        match self.server_capabilities() {
            Some(caps) if !supported(&caps) => {
                Err(Error::Protocol(format!("server does not support {}", feature)))
            }
            _ => Ok(()),
        }
    }

    pub async fn ping(&self) -> Result<(), Error> {
        self.session.ping().await?.await.map(drop)
    }

    // Tools

    pub async fn list_tools(&self, cursor: Option<Cursor>) -> Result<ListToolsResult, Error> {
        self.require("tools", |c| c.tools.is_some())?;
        self.session.request(ListToolsRequest::METHOD, PaginatedParams::from_cursor(cursor)).await
    }

    /// Every tool, following `nextCursor` until the last page
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>, Error> {
        collect_pages(|cursor| self.list_tools(cursor)).await
    }

    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>
    ) -> Result<CallToolResult, Error> {
        self.require("tools", |c| c.tools.is_some())?;
        let params = CallToolParams {
            meta: None,
            name: name.into(),
            arguments,
        };
        self.session.request(CallToolRequest::METHOD, params).await
    }

    /// Call a tool and receive its progress updates.
    ///
    /// Decode the result with `call.decode::<CallToolResult>()`.
    pub async fn call_tool_with_progress(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>
    ) -> Result<(PendingCall, ProgressStream), Error> {
        self.require("tools", |c| c.tools.is_some())?;
        let params = CallToolParams {
            meta: None,
            name: name.into(),
            arguments,
        };
        self.session.send_with_progress(CallToolRequest::METHOD, Some(serde_json::to_value(params)?)).await
    }

    // Resources

    pub async fn list_resources(&self, cursor: Option<Cursor>) -> Result<ListResourcesResult, Error> {
        self.require("resources", |c| c.resources.is_some())?;
        self.session.request(ListResourcesRequest::METHOD, PaginatedParams::from_cursor(cursor)).await
    }

    pub async fn list_resource_templates(
        &self,
        cursor: Option<Cursor>
    ) -> Result<ListResourceTemplatesResult, Error> {
        self.require("resources", |c| c.resources.is_some())?;
        self.session.request(ListResourceTemplatesRequest::METHOD, PaginatedParams::from_cursor(cursor)).await
    }

    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<ReadResourceResult, Error> {
        self.require("resources", |c| c.resources.is_some())?;
        self.session.request(ReadResourceRequest::METHOD, ResourceUriParams { uri: uri.into() }).await
    }

    /// Ask for `notifications/resources/updated` about one resource
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> Result<(), Error> {
        self.require("resource subscriptions", |c| c.resources_subscribe())?;
        let _: EmptyResult = self.session.request(
            SubscribeRequest::METHOD,
            ResourceUriParams { uri: uri.into() }
        ).await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> Result<(), Error> {
        self.require("resource subscriptions", |c| c.resources_subscribe())?;
        let _: EmptyResult = self.session.request(
            UnsubscribeRequest::METHOD,
            ResourceUriParams { uri: uri.into() }
        ).await?;
        Ok(())
    }

    // Prompts

    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> Result<ListPromptsResult, Error> {
        self.require("prompts", |c| c.prompts.is_some())?;
        self.session.request(ListPromptsRequest::METHOD, PaginatedParams::from_cursor(cursor)).await
    }

    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>
    ) -> Result<GetPromptResult, Error> {
        self.require("prompts", |c| c.prompts.is_some())?;
        let params = GetPromptParams {
            name: name.into(),
            arguments,
        };
        self.session.request(GetPromptRequest::METHOD, params).await
    }

    // Completion and logging

    pub async fn complete(
        &self,
        reference: impl Into<Reference>,
        argument: CompleteArgument
    ) -> Result<CompleteResult, Error> {
        self.require("completions", |c| c.completions.is_some())?;
        let params = CompleteParams {
            ref_: OneOf::new(reference),
            argument,
        };
        self.session.request(CompleteRequest::METHOD, params).await
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<(), Error> {
        self.require("logging", |c| c.logging.is_some())?;
        let _: EmptyResult = self.session.request(SetLevelRequest::METHOD, SetLevelParams { level }).await?;
        Ok(())
    }

    // Notifications

    /// List-changed and resource-updated events from the server
    pub fn subscribe_changes(&self) -> Subscription<ChangeEvent> {
        self.session.subscribe_changes()
    }

    /// Log messages the server sends with `notifications/message`
    pub fn on_log_message<F, Fut>(&self, handler: F)
        where F: Fn(LoggingMessageParams) -> Fut + Send + Sync + 'static, Fut: Future<Output = ()> + Send + 'static
    {
        let handler = std::sync::Arc::new(handler);
        self.session.on_notification(LoggingMessageNotification::METHOD, move |notification| {
            let handler = handler.clone();
            async move {
                let params = notification.params.unwrap_or(Value::Null);
                match serde_json::from_value(params) {
                    Ok(params) => handler(params).await,
                    Err(e) => debug!("Ignoring malformed log message: {}", e),
                }
            }
        });
    }

    /// Tell the server our roots changed
    pub async fn notify_roots_list_changed(&self) -> Result<(), Error> {
        let advertised = self.session
            .config()
            .capabilities.as_client()
            .is_some_and(|c| c.supports_roots_list_changed());
        if !advertised {
            return Err(Error::Protocol("roots list-changed notifications were not advertised".to_string()));
        }
        self.session.notify(RootsListChangedNotification::METHOD, None).await
    }

    // Requests from the server

    /// Answer `roots/list`
    pub fn on_list_roots<F, Fut>(&self, handler: F)
        where F: Fn(RequestContext) -> Fut + Send + Sync + 'static, Fut: Future<Output = Result<ListRootsResult, Error>> + Send + 'static
    {
        self.session.register_typed_handler(ListRootsRequest::METHOD, move |ctx, _params: Meta| handler(ctx));
    }

    /// Answer `sampling/createMessage`
    pub fn on_create_message<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, CreateMessageParams) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<CreateMessageResult, Error>> + Send + 'static
    {
        self.session.register_typed_handler(CreateMessageRequest::METHOD, handler);
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}
