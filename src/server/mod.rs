//! MCP Server
//!
//! Typed server API over a [`Session`]. Handlers for tools, resources,
//! prompts, completion and logging are registered on the [`ServerSession`];
//! outgoing notifications are refused unless the matching capability was
//! advertised.
//!
//! Register handlers before the client sends `initialize`. A request that
//! arrives for a method with no handler is answered with MethodNotFound.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::Error;
use crate::protocol::pagination::{ Cursor, PaginatedParams };
use crate::protocol::types::*;
use crate::session::{ Negotiated, RequestContext, Session, SessionConfig };
use crate::transport::Connection;

/// Builder for a [`ServerSession`]
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    config: SessionConfig,
    capabilities: ServerCapabilities,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::server(),
            capabilities: ServerCapabilities::default(),
        }
    }

    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config = self.config.with_info(name, version);
        self
    }

    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tools(mut self, list_changed: bool) -> Self {
        self.capabilities = self.capabilities.with_tools(list_changed);
        self
    }

    pub fn with_prompts(mut self, list_changed: bool) -> Self {
        self.capabilities = self.capabilities.with_prompts(list_changed);
        self
    }

    pub fn with_resources(mut self, subscribe: bool, list_changed: bool) -> Self {
        self.capabilities = self.capabilities.with_resources(subscribe, list_changed);
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.capabilities = self.capabilities.with_logging();
        self
    }

    pub fn with_completions(mut self) -> Self {
        self.capabilities = self.capabilities.with_completions();
        self
    }

    /// Usage hints returned to the client in the initialize result
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config = self.config.with_instructions(instructions);
        self
    }

    /// Protocol versions to accept, newest first
    pub fn with_protocol_versions<I, S>(mut self, versions: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.config = self.config.with_protocol_versions(versions);
        self
    }

    /// Start serving `connection`
    pub fn build(self, connection: Connection) -> (ServerSession, JoinHandle<()>) {
        let config = self.config.with_capabilities(self.capabilities);
        let (session, reader) = Session::connect(connection, config);
        (ServerSession { session }, reader)
    }
}

/// The server side of an MCP conversation
#[derive(Debug, Clone)]
pub struct ServerSession {
    session: Session,
}

impl ServerSession {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Wait for the client to finish initializing
    pub async fn wait_ready(&self) -> Result<(), Error> {
        self.session.wait_ready().await
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.session.negotiated()
    }

    /// Capabilities the client advertised, once initialized
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.session.negotiated().and_then(|n| n.peer_capabilities.as_client().cloned())
    }

    fn capabilities(&self) -> ServerCapabilities {
        self.session.config().capabilities.as_server().cloned().unwrap_or_default()
    }

    fn require(&self, feature: &str, advertised: impl Fn(&ServerCapabilities) -> bool) -> Result<(), Error> {
        if advertised(&self.capabilities()) {
            Ok(())
        } else {
            Err(Error::Protocol(format!("{} was not advertised", feature)))
        }
    }

    // Handlers

    /// Answer any request method with typed params and result
    pub fn on_request<P, R, F, Fut>(&self, method: impl Into<String>, handler: F)
        where
            P: DeserializeOwned + Send + 'static,
            R: Serialize + Send + 'static,
            F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<R, Error>> + Send + 'static
    {
        self.session.register_typed_handler(method, handler);
    }

    /// Answer `tools/list`; the handler gets the cursor verbatim
    pub fn on_list_tools<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, Option<Cursor>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ListToolsResult, Error>> + Send + 'static
    {
        self.on_request(ListToolsRequest::METHOD, move |ctx, params: PaginatedParams| handler(ctx, params.cursor));
    }

    /// Answer `tools/call`. Report tool failures in the result, not as errors.
    pub fn on_call_tool<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, CallToolParams) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<CallToolResult, Error>> + Send + 'static
    {
        self.on_request(CallToolRequest::METHOD, handler);
    }

    pub fn on_list_resources<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, Option<Cursor>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ListResourcesResult, Error>> + Send + 'static
    {
        self.on_request(ListResourcesRequest::METHOD, move |ctx, params: PaginatedParams| handler(ctx, params.cursor));
    }

    pub fn on_list_resource_templates<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, Option<Cursor>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ListResourceTemplatesResult, Error>> + Send + 'static
    {
        self.on_request(ListResourceTemplatesRequest::METHOD, move |ctx, params: PaginatedParams| {
            handler(ctx, params.cursor)
        });
    }

    pub fn on_read_resource<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, String) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ReadResourceResult, Error>> + Send + 'static
    {
        self.on_request(ReadResourceRequest::METHOD, move |ctx, params: ResourceUriParams| handler(ctx, params.uri));
    }

    /// Answer `resources/subscribe` and `resources/unsubscribe`; the flag is true for subscribe
    pub fn on_subscription<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, String, bool) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<(), Error>> + Send + 'static
    {
        let handler = std::sync::Arc::new(handler);
        for (method, subscribe) in [(SubscribeRequest::METHOD, true), (UnsubscribeRequest::METHOD, false)] {
            let handler = handler.clone();
            self.on_request(method, move |ctx, params: ResourceUriParams| {
                let outcome = handler(ctx, params.uri, subscribe);
                async move {
                    outcome.await?;
                    Ok(EmptyResult::default())
                }
            });
        }
    }

    pub fn on_list_prompts<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, Option<Cursor>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<ListPromptsResult, Error>> + Send + 'static
    {
        self.on_request(ListPromptsRequest::METHOD, move |ctx, params: PaginatedParams| handler(ctx, params.cursor));
    }

    pub fn on_get_prompt<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, GetPromptParams) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<GetPromptResult, Error>> + Send + 'static
    {
        self.on_request(GetPromptRequest::METHOD, handler);
    }

    pub fn on_complete<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, CompleteParams) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<CompleteResult, Error>> + Send + 'static
    {
        self.on_request(CompleteRequest::METHOD, handler);
    }

    /// Answer `logging/setLevel`
    pub fn on_set_level<F, Fut>(&self, handler: F)
        where
            F: Fn(RequestContext, LoggingLevel) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<(), Error>> + Send + 'static
    {
        self.on_request(SetLevelRequest::METHOD, move |ctx, params: SetLevelParams| {
            let outcome = handler(ctx, params.level);
            async move {
                outcome.await?;
                Ok(EmptyResult::default())
            }
        });
    }

    // Notifications to the client

    pub async fn notify_tools_list_changed(&self) -> Result<(), Error> {
        self.require("tools.listChanged", |c| c.tools_list_changed())?;
        self.session.notify(ToolListChangedNotification::METHOD, None).await
    }

    pub async fn notify_prompts_list_changed(&self) -> Result<(), Error> {
        self.require("prompts.listChanged", |c| c.prompts_list_changed())?;
        self.session.notify(PromptListChangedNotification::METHOD, None).await
    }

    pub async fn notify_resources_list_changed(&self) -> Result<(), Error> {
        self.require("resources.listChanged", |c| c.resources_list_changed())?;
        self.session.notify(ResourceListChangedNotification::METHOD, None).await
    }

    /// Tell subscribers a resource changed
    pub async fn notify_resource_updated(&self, uri: impl Into<String>) -> Result<(), Error> {
        self.require("resources.subscribe", |c| c.resources_subscribe())?;
        let params = serde_json::to_value(ResourceUriParams { uri: uri.into() })?;
        self.session.notify(ResourceUpdatedNotification::METHOD, Some(params)).await
    }

    /// Send a log message to the client
    pub async fn log_message(
        &self,
        level: LoggingLevel,
        logger: Option<String>,
        data: Value
    ) -> Result<(), Error> {
        self.require("logging", |c| c.logging.is_some())?;
        let params = serde_json::to_value(LoggingMessageParams { level, logger, data })?;
        self.session.notify(LoggingMessageNotification::METHOD, Some(params)).await
    }

    // Requests to the client

    pub async fn list_roots(&self) -> Result<ListRootsResult, Error> {
        if !self.client_capabilities().is_some_and(|c| c.supports_roots()) {
            return Err(Error::Protocol("client does not support roots".to_string()));
        }
        self.session.request(ListRootsRequest::METHOD, Value::Null).await
    }

    /// Ask the client to sample its LLM
    pub async fn create_message(&self, params: CreateMessageParams) -> Result<CreateMessageResult, Error> {
        if !self.client_capabilities().is_some_and(|c| c.supports_sampling()) {
            return Err(Error::Protocol("client does not support sampling".to_string()));
        }
        debug!("Requesting sampling with {} message(s)", params.messages.len());
        self.session.request(CreateMessageRequest::METHOD, params).await
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{ AtomicBool, Ordering };

    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::client::{ ClientBuilder, ClientSession };
    use crate::session::ChangeEvent;
    use crate::transport::channel;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.into(),
            description: None,
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn connect(server: ServerBuilder, client: ClientBuilder) -> (ServerSession, ClientSession) {
        let (client_end, server_end) = channel::pair(16);
        let (server, _) = server.with_info("test-server", "1.0").build(server_end);
        let (client, _) = client.build(client_end);
        (server, client)
    }

    async fn ready(server: &ServerSession, client: &ClientSession) {
        client.initialize().await.unwrap();
        server.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn tools_are_listed_across_pages_and_called() {
        let (server, client) = connect(ServerBuilder::new().with_tools(true), ClientBuilder::new()).await;
        server.on_list_tools(|_ctx, cursor| async move {
            Ok(match cursor.as_ref().map(Cursor::as_str) {
                None => ListToolsResult { meta: None, next_cursor: Some(Cursor::new("page-2")), tools: vec![tool("a")] },
                Some("page-2") => ListToolsResult { meta: None, next_cursor: None, tools: vec![tool("b")] },
                Some(other) => {
                    return Err(Error::InvalidParams(format!("bad cursor {}", other)));
                }
            })
        });
        server.on_call_tool(|_ctx, params| async move {
            Ok(match params.name.as_str() {
                "echo" => CallToolResult::text(params.arguments.map(Value::Object).unwrap_or_default().to_string()),
                _ => CallToolResult::error("unknown tool"),
            })
        });
        ready(&server, &client).await;

        let names: Vec<String> = client.list_all_tools().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["a", "b"]);

        let result = client.call_tool("echo", json!({ "x": 1 }).as_object().cloned()).await.unwrap();
        assert_eq!(result.content[0].text().map(|t| t.text.as_str()), Some("{\"x\":1}"));
        let result = client.call_tool("nope", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));

        match client.list_tools(Some(Cursor::new("zzz"))).await {
            Err(Error::Rpc(data)) => assert_eq!(data.code, crate::errors::error_codes::INVALID_PARAMS),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn tool_progress_reaches_the_client() {
        let (server, client) = connect(ServerBuilder::new().with_tools(false), ClientBuilder::new()).await;
        server.on_call_tool(|ctx, _params| async move {
            for step in 1..=3 {
                ctx.report_progress(step as f64, Some(3.0), None).await?;
            }
            Ok(CallToolResult::text("done"))
        });
        ready(&server, &client).await;

        let (call, progress) = client.call_tool_with_progress("work", None).await.unwrap();
        let result: CallToolResult = call.decode().await.unwrap();
        assert_eq!(result.content[0].text().map(|t| t.text.as_str()), Some("done"));
        let steps: Vec<f64> = progress.map(|p| p.progress).collect().await;
        assert_eq!(steps, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn resources_can_be_read_and_watched() {
        let (server, client) = connect(ServerBuilder::new().with_resources(true, true), ClientBuilder::new()).await;
        let subscribed = Arc::new(AtomicBool::new(false));
        server.on_read_resource(|_ctx, uri| async move {
            Ok(ReadResourceResult {
                meta: None,
                contents: vec![
                    crate::protocol::one_of::OneOf::new(TextResourceContents {
                        uri,
                        mime_type: Some("text/plain".into()),
                        text: "hello".into(),
                    })
                ],
            })
        });
        server.on_subscription({
            let subscribed = subscribed.clone();
            move |_ctx, _uri, subscribe| {
                subscribed.store(subscribe, Ordering::SeqCst);
                async { Ok(()) }
            }
        });
        ready(&server, &client).await;

        let read = client.read_resource("file:///greeting").await.unwrap();
        let text = read.contents[0].text().unwrap();
        assert_eq!((text.uri.as_str(), text.text.as_str()), ("file:///greeting", "hello"));

        let mut changes = client.subscribe_changes();
        client.subscribe_resource("file:///greeting").await.unwrap();
        assert!(subscribed.load(Ordering::SeqCst));

        server.notify_resource_updated("file:///greeting").await.unwrap();
        server.notify_resources_list_changed().await.unwrap();
        assert_eq!(changes.next().await, Some(ChangeEvent::ResourceUpdated { uri: "file:///greeting".into() }));
        assert_eq!(changes.next().await, Some(ChangeEvent::ResourcesListChanged));

        client.unsubscribe_resource("file:///greeting").await.unwrap();
        assert!(!subscribed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn resource_and_prompt_catalogs_are_listed() {
        let (server, client) = connect(
            ServerBuilder::new().with_resources(false, false).with_prompts(false),
            ClientBuilder::new()
        ).await;
        server.on_list_resources(|_ctx, cursor| async move {
            let (name, next_cursor) = match cursor {
                None => ("first", Some(Cursor::new("2"))),
                Some(_) => ("second", None),
            };
            Ok(ListResourcesResult {
                meta: None,
                next_cursor,
                resources: vec![Resource {
                    uri: format!("file:///{}", name),
                    name: name.into(),
                    description: None,
                    mime_type: None,
                    size: None,
                    annotations: None,
                }],
            })
        });
        server.on_list_resource_templates(|_ctx, _cursor| async {
            Ok(ListResourceTemplatesResult {
                meta: None,
                next_cursor: None,
                resource_templates: vec![ResourceTemplate {
                    uri_template: "file:///{path}".into(),
                    name: "files".into(),
                    description: None,
                    mime_type: None,
                    annotations: None,
                }],
            })
        });
        server.on_list_prompts(|_ctx, _cursor| async {
            Ok(ListPromptsResult {
                meta: None,
                next_cursor: None,
                prompts: vec![Prompt { name: "explain".into(), description: None, arguments: None }],
            })
        });
        ready(&server, &client).await;

        let page = client.list_resources(None).await.unwrap();
        assert_eq!(page.next_cursor, Some(Cursor::new("2")));
        let uris: Vec<String> = crate::protocol::pagination::collect_pages(|cursor| client.list_resources(cursor)).await
            .unwrap()
            .into_iter()
            .map(|r| r.uri)
            .collect();
        assert_eq!(uris, ["file:///first", "file:///second"]);

        let templates = client.list_resource_templates(None).await.unwrap();
        assert_eq!(templates.resource_templates[0].uri_template, "file:///{path}");
        let prompts = client.list_prompts(None).await.unwrap();
        assert_eq!(prompts.prompts[0].name, "explain");
    }

    #[tokio::test]
    async fn prompts_and_completion() {
        let (server, client) = connect(
            ServerBuilder::new().with_prompts(false).with_completions(),
            ClientBuilder::new()
        ).await;
        server.on_get_prompt(|_ctx, params| async move {
            let topic = params.arguments.and_then(|mut a| a.remove("topic")).unwrap_or_default();
            Ok(GetPromptResult {
                meta: None,
                description: None,
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: crate::protocol::one_of::OneOf::new(TextContent::new(format!("Tell me about {}", topic))),
                }],
            })
        });
        server.on_complete(|_ctx, params| async move {
            let prefix = params.argument.value;
            let values = ["rust", "ruby", "python"]
                .into_iter()
                .filter(|v| v.starts_with(&prefix))
                .map(String::from)
                .collect();
            Ok(CompleteResult { meta: None, completion: Completion { values, ..Completion::default() } })
        });
        ready(&server, &client).await;

        let args = HashMap::from([("topic".to_string(), "crabs".to_string())]);
        let prompt = client.get_prompt("explain", Some(args)).await.unwrap();
        assert_eq!(
            prompt.messages[0].content.text().map(|t| t.text.as_str()),
            Some("Tell me about crabs")
        );

        let completion = client
            .complete(PromptReference::new("explain"), CompleteArgument { name: "topic".into(), value: "ru".into() }).await
            .unwrap();
        assert_eq!(completion.completion.values, ["rust", "ruby"]);
    }

    #[tokio::test]
    async fn notifications_need_their_capability() {
        let (server, client) = connect(ServerBuilder::new().with_tools(false), ClientBuilder::new()).await;
        ready(&server, &client).await;

        assert!(matches!(server.notify_tools_list_changed().await, Err(Error::Protocol(_))));
        assert!(matches!(server.notify_prompts_list_changed().await, Err(Error::Protocol(_))));
        assert!(matches!(server.log_message(LoggingLevel::Info, None, json!("hi")).await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn log_messages_and_level_changes() {
        let (server, client) = connect(ServerBuilder::new().with_logging(), ClientBuilder::new()).await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        server.on_set_level(|ctx, level| async move {
            ctx.session().notify(
                LoggingMessageNotification::METHOD,
                Some(json!({ "level": level, "data": "level changed" }))
            ).await
        });
        client.on_log_message(move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        });
        ready(&server, &client).await;

        client.set_logging_level(LoggingLevel::Warning).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!((first.level, first.data), (LoggingLevel::Warning, json!("level changed")));

        server.log_message(LoggingLevel::Error, Some("db".into()), json!({ "msg": "down" })).await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.logger.as_deref(), Some("db"));
    }

    #[tokio::test]
    async fn sampling_round_trip() {
        let (server, client) = connect(ServerBuilder::new(), ClientBuilder::new().with_sampling()).await;
        client.on_create_message(|_ctx, params| async move {
            Ok(CreateMessageResult {
                meta: None,
                role: Role::Assistant,
                content: crate::protocol::one_of::OneOf::new(
                    TextContent::new(format!("{} message(s) seen", params.messages.len()))
                ),
                model: "test-model".into(),
                stop_reason: Some("endTurn".into()),
            })
        });
        ready(&server, &client).await;

        let result = server
            .create_message(CreateMessageParams {
                messages: vec![SamplingMessage {
                    role: Role::User,
                    content: crate::protocol::one_of::OneOf::new(TextContent::new("hi")),
                }],
                model_preferences: None,
                system_prompt: None,
                include_context: None,
                temperature: None,
                max_tokens: 32,
                stop_sequences: None,
                metadata: None,
            }).await
            .unwrap();
        assert_eq!(result.model, "test-model");
        assert_eq!(result.content.text().map(|t| t.text.as_str()), Some("1 message(s) seen"));
    }
}
