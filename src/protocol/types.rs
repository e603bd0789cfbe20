//! MCP schema types
//!
//! Params, results and notification payloads for every method the session
//! knows about. Result records are flat: each embeds its own `_meta` and, for
//! list results, `nextCursor`.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };

use crate::protocol::envelope::RequestId;
use crate::protocol::one_of::{ impl_shape, OneOf };
use crate::protocol::pagination::{ Cursor, PaginatedParams };
use crate::protocol::unions::{ Content, Reference, ResourceContents };

/// Free-form `_meta` object
pub type Meta = Map<String, Value>;

/// Declare a request or notification struct keyed by its method name.
///
/// `params?:` makes the params optional, `params:` makes them required, and
/// leaving them out gives optional free-form params.
macro_rules! message_type {
    ($(#[$meta:meta])* $name:ident => $method:literal) => {
        message_type!($(#[$meta])* $name => $method, params?: Meta);
    };
    ($(#[$meta:meta])* $name:ident => $method:literal, params?: $params:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
        pub struct $name {
            pub method: String,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub params: Option<$params>,
        }

        impl $name {
            pub const METHOD: &'static str = $method;

            pub fn new(params: Option<$params>) -> Self {
                Self {
                    method: Self::METHOD.to_string(),
                    params,
                }
            }
        }

        impl_shape!($name [ "method" = $method ]);
    };
    ($(#[$meta:meta])* $name:ident => $method:literal, params: $params:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
        pub struct $name {
            pub method: String,
            pub params: $params,
        }

        impl $name {
            pub const METHOD: &'static str = $method;

            pub fn new(params: $params) -> Self {
                Self {
                    method: Self::METHOD.to_string(),
                    params,
                }
            }
        }

        impl_shape!($name [ "method" = $method ]);
    };
}

/// A progress token, used to associate progress notifications with the original request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    String(String),
}

impl std::fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressToken::Number(n) => write!(f, "{}", n),
            ProgressToken::String(s) => f.write_str(s),
        }
    }
}

/// Describes the name and version of an MCP implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// The sender or recipient of messages and data in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Optional annotations for the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capabilities a client may support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities that the client supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// Present if the client supports listing roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// Present if the client supports sampling from an LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Meta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ClientCapabilities {
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.roots = Some(RootsCapability { list_changed: Some(list_changed) });
        self
    }

    pub fn with_sampling(mut self) -> Self {
        self.sampling = Some(Meta::new());
        self
    }

    pub fn supports_roots(&self) -> bool {
        self.roots.is_some()
    }

    pub fn supports_roots_list_changed(&self) -> bool {
        self.roots.as_ref().and_then(|r| r.list_changed).unwrap_or(false)
    }

    pub fn supports_sampling(&self) -> bool {
        self.sampling.is_some()
    }
}

/// Capabilities that a server may support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Experimental, non-standard capabilities that the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// Present if the server supports sending log messages to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Meta>,
    /// Present if the server supports argument autocompletion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<Meta>,
    /// Present if the server offers any prompt templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Present if the server offers any resources to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Present if the server offers any tools to call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ServerCapabilities {
    pub fn with_tools(mut self, list_changed: bool) -> Self {
        self.tools = Some(ToolsCapability { list_changed: Some(list_changed) });
        self
    }

    pub fn with_prompts(mut self, list_changed: bool) -> Self {
        self.prompts = Some(PromptsCapability { list_changed: Some(list_changed) });
        self
    }

    pub fn with_resources(mut self, subscribe: bool, list_changed: bool) -> Self {
        self.resources = Some(ResourcesCapability {
            subscribe: Some(subscribe),
            list_changed: Some(list_changed),
        });
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.logging = Some(Meta::new());
        self
    }

    pub fn with_completions(mut self) -> Self {
        self.completions = Some(Meta::new());
        self
    }

    pub fn tools_list_changed(&self) -> bool {
        self.tools.as_ref().and_then(|t| t.list_changed).unwrap_or(false)
    }

    pub fn prompts_list_changed(&self) -> bool {
        self.prompts.as_ref().and_then(|p| p.list_changed).unwrap_or(false)
    }

    pub fn resources_list_changed(&self) -> bool {
        self.resources.as_ref().and_then(|r| r.list_changed).unwrap_or(false)
    }

    pub fn resources_subscribe(&self) -> bool {
        self.resources.as_ref().and_then(|r| r.subscribe).unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// The latest version of the protocol the client supports.
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

/// After receiving an initialize request from the client, the server sends this response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    /// The version the server wants to use; may differ from the requested one.
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    /// Usage hints for the client, e.g. to put in a system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
impl_shape!(InitializeResult {
    "protocolVersion": String,
    "capabilities": Object,
    "serverInfo": Object,
});

message_type! {
    /// Sent from the client to the server when it first connects.
    InitializeRequest => "initialize", params: InitializeParams
}

message_type! {
    /// Sent from the client once initialization has finished.
    InitializedNotification => "notifications/initialized"
}

message_type! {
    /// Liveness check; the receiver must answer promptly with an empty result.
    PingRequest => "ping"
}

/// A response that indicates success but carries no data.
///
/// Only `_meta` is accepted, so unknown result shapes are not mistaken for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EmptyResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}
impl_shape!(EmptyResult {});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    /// The ID of the request to cancel.
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

message_type! {
    /// Either side may send this to indicate it is cancelling an earlier request.
    CancelledNotification => "notifications/cancelled", params: CancelledParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    /// Progress so far; increases every time progress is made.
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

message_type! {
    /// Out-of-band progress update for a long-running request.
    ProgressNotification => "notifications/progress", params: ProgressParams
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Text provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub type_field: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}
impl_shape!(TextContent [ "type" = "text" ] { "text": String });

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            type_field: "text".to_string(),
            text: text.into(),
            annotations: None,
        }
    }
}

/// An image provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    #[serde(rename = "type")]
    pub type_field: String,
    /// The base64-encoded image data.
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}
impl_shape!(ImageContent [ "type" = "image" ] { "data": String, "mimeType": String });

impl ImageContent {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            type_field: "image".to_string(),
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }
}

/// Audio provided to or from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioContent {
    #[serde(rename = "type")]
    pub type_field: String,
    /// The base64-encoded audio data.
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}
impl_shape!(AudioContent [ "type" = "audio" ] { "data": String, "mimeType": String });

impl AudioContent {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            type_field: "audio".to_string(),
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }
}

/// The contents of a resource, embedded into a prompt or tool call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmbeddedResource {
    #[serde(rename = "type")]
    pub type_field: String,
    pub resource: OneOf<ResourceContents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}
impl_shape!(EmbeddedResource [ "type" = "resource" ] { "resource": Object });

impl EmbeddedResource {
    pub fn new(resource: impl Into<ResourceContents>) -> Self {
        Self {
            type_field: "resource".to_string(),
            resource: OneOf::new(resource),
            annotations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}
impl_shape!(TextResourceContents { "uri": String, "text": String });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded binary data.
    pub blob: String,
}
impl_shape!(BlobResourceContents { "uri": String, "blob": String });

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// Definition for a tool the client can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A JSON Schema object defining the expected parameters for the tool.
    pub input_schema: Value,
}

message_type! {
    /// Sent from the client to request a list of tools the server has.
    ListToolsRequest => "tools/list", params?: PaginatedParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    pub tools: Vec<Tool>,
}
impl_shape!(ListToolsResult { "tools": Array });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CallToolParams {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

message_type! {
    /// Used by the client to invoke a tool provided by the server.
    CallToolRequest => "tools/call", params: CallToolParams
}

/// The server's response to a tool call.
///
/// Tool failures are reported here with `isError` set, not as protocol errors,
/// so the model can see them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub content: Vec<OneOf<Content>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}
impl_shape!(CallToolResult { "content": Array });

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            meta: None,
            content: vec![OneOf::new(TextContent::new(text))],
            is_error: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(text)
        }
    }
}

message_type! {
    /// The server's list of tools has changed.
    ToolListChangedNotification => "notifications/tools/list_changed"
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A known resource that the server is capable of reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// A template description for resources available on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    /// A URI template (RFC 6570).
    pub uri_template: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

message_type! {
    ListResourcesRequest => "resources/list", params?: PaginatedParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    pub resources: Vec<Resource>,
}
impl_shape!(ListResourcesResult { "resources": Array });

message_type! {
    ListResourceTemplatesRequest => "resources/templates/list", params?: PaginatedParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListResourceTemplatesResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    pub resource_templates: Vec<ResourceTemplate>,
}
impl_shape!(ListResourceTemplatesResult { "resourceTemplates": Array });

/// Params naming a single resource by URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceUriParams {
    pub uri: String,
}

message_type! {
    ReadResourceRequest => "resources/read", params: ResourceUriParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReadResourceResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub contents: Vec<OneOf<ResourceContents>>,
}
impl_shape!(ReadResourceResult { "contents": Array });

message_type! {
    /// Ask to receive `notifications/resources/updated` for a resource.
    SubscribeRequest => "resources/subscribe", params: ResourceUriParams
}

message_type! {
    UnsubscribeRequest => "resources/unsubscribe", params: ResourceUriParams
}

message_type! {
    ResourceListChangedNotification => "notifications/resources/list_changed"
}

message_type! {
    /// A subscribed resource has changed and may need to be read again.
    ResourceUpdatedNotification => "notifications/resources/updated", params: ResourceUriParams
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// A prompt or prompt template that the server offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Describes an argument that a prompt can accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

message_type! {
    ListPromptsRequest => "prompts/list", params?: PaginatedParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    pub prompts: Vec<Prompt>,
}
impl_shape!(ListPromptsResult { "prompts": Array });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

message_type! {
    GetPromptRequest => "prompts/get", params: GetPromptParams
}

/// Describes a message returned as part of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromptMessage {
    pub role: Role,
    pub content: OneOf<Content>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetPromptResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}
impl_shape!(GetPromptResult { "messages": Array });

message_type! {
    PromptListChangedNotification => "notifications/prompts/list_changed"
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Identifies a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromptReference {
    #[serde(rename = "type")]
    pub type_field: String,
    pub name: String,
}
impl_shape!(PromptReference [ "type" = "ref/prompt" ] { "name": String });

impl PromptReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            type_field: "ref/prompt".to_string(),
            name: name.into(),
        }
    }
}

/// A reference to a resource or resource template definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceReference {
    #[serde(rename = "type")]
    pub type_field: String,
    pub uri: String,
}
impl_shape!(ResourceReference [ "type" = "ref/resource" ] { "uri": String });

impl ResourceReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            type_field: "ref/resource".to_string(),
            uri: uri.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompleteArgument {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompleteParams {
    #[serde(rename = "ref")]
    pub ref_: OneOf<Reference>,
    pub argument: CompleteArgument,
}

message_type! {
    /// A request from the client for completion options.
    CompleteRequest => "completion/complete", params: CompleteParams
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// At most 100 values.
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompleteResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub completion: Completion,
}
impl_shape!(CompleteResult { "completion": Object });

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Syslog severities, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SetLevelParams {
    pub level: LoggingLevel,
}

message_type! {
    /// Enable or adjust logging from the server.
    SetLevelRequest => "logging/setLevel", params: SetLevelParams
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

message_type! {
    LoggingMessageNotification => "notifications/message", params: LoggingMessageParams
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplingMessage {
    pub role: Role,
    pub content: OneOf<Content>,
}

/// Hints to use for model selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The server's preferences for model selection, requested of the client during sampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    None,
    ThisServer,
    AllServers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

message_type! {
    /// A request from the server to sample an LLM via the client.
    CreateMessageRequest => "sampling/createMessage", params: CreateMessageParams
}

/// The client's response to a sampling/createMessage request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub role: Role,
    pub content: OneOf<Content>,
    /// The name of the model that generated the message.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}
impl_shape!(CreateMessageResult {
    "role": String,
    "content": Object,
    "model": String,
});

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// A root directory or file that the server can operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Root {
    /// Must start with `file://` for now.
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

message_type! {
    /// Sent from the server to request the client's root URIs.
    ListRootsRequest => "roots/list"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ListRootsResult {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub roots: Vec<Root>,
}
impl_shape!(ListRootsResult { "roots": Array });

message_type! {
    RootsListChangedNotification => "notifications/roots/list_changed"
}
