//! Payload unions
//!
//! Every place the protocol allows "one of N known shapes" is declared here.
//! Variant order matters for untagged shapes: the first structural match wins,
//! so broader shapes (like [`EmptyResult`]) go last.

use serde_json::{ Map, Value };

use crate::protocol::envelope::{ Notification, Request };
use crate::protocol::one_of::{ one_of, OneOf, PayloadError, Variants };
use crate::protocol::types::*;

one_of! {
    /// Content of a message, tool result or prompt.
    pub enum Content {
        Text(TextContent) => text / set_text,
        Image(ImageContent) => image / set_image,
        Audio(AudioContent) => audio / set_audio,
        Resource(EmbeddedResource) => resource / set_resource,
    }
}

one_of! {
    /// Contents of a specific resource or sub-resource.
    pub enum ResourceContents {
        Text(TextResourceContents) => text / set_text,
        Blob(BlobResourceContents) => blob / set_blob,
    }
}

one_of! {
    /// What a completion request is about.
    pub enum Reference {
        Prompt(PromptReference) => prompt / set_prompt,
        Resource(ResourceReference) => resource / set_resource,
    }
}

one_of! {
    /// Requests a client may send.
    pub enum ClientRequest {
        Initialize(InitializeRequest) => initialize / set_initialize,
        Ping(PingRequest) => ping / set_ping,
        ListResources(ListResourcesRequest) => list_resources / set_list_resources,
        ListResourceTemplates(ListResourceTemplatesRequest) => list_resource_templates / set_list_resource_templates,
        ReadResource(ReadResourceRequest) => read_resource / set_read_resource,
        Subscribe(SubscribeRequest) => subscribe / set_subscribe,
        Unsubscribe(UnsubscribeRequest) => unsubscribe / set_unsubscribe,
        ListPrompts(ListPromptsRequest) => list_prompts / set_list_prompts,
        GetPrompt(GetPromptRequest) => get_prompt / set_get_prompt,
        ListTools(ListToolsRequest) => list_tools / set_list_tools,
        CallTool(CallToolRequest) => call_tool / set_call_tool,
        SetLevel(SetLevelRequest) => set_level / set_set_level,
        Complete(CompleteRequest) => complete / set_complete,
    }
}

one_of! {
    /// Notifications a client may send.
    pub enum ClientNotification {
        Cancelled(CancelledNotification) => cancelled / set_cancelled,
        Initialized(InitializedNotification) => initialized / set_initialized,
        Progress(ProgressNotification) => progress / set_progress,
        RootsListChanged(RootsListChangedNotification) => roots_list_changed / set_roots_list_changed,
    }
}

one_of! {
    /// Results a client may return.
    pub enum ClientResult {
        CreateMessage(CreateMessageResult) => create_message / set_create_message,
        ListRoots(ListRootsResult) => list_roots / set_list_roots,
        Empty(EmptyResult) => empty_result / set_empty_result,
    }
}

one_of! {
    /// Requests a server may send.
    pub enum ServerRequest {
        Ping(PingRequest) => ping / set_ping,
        CreateMessage(CreateMessageRequest) => create_message / set_create_message,
        ListRoots(ListRootsRequest) => list_roots / set_list_roots,
    }
}

one_of! {
    /// Notifications a server may send.
    pub enum ServerNotification {
        Cancelled(CancelledNotification) => cancelled / set_cancelled,
        Progress(ProgressNotification) => progress / set_progress,
        LoggingMessage(LoggingMessageNotification) => logging_message / set_logging_message,
        ResourceUpdated(ResourceUpdatedNotification) => resource_updated / set_resource_updated,
        ResourceListChanged(ResourceListChangedNotification) => resource_list_changed / set_resource_list_changed,
        ToolListChanged(ToolListChangedNotification) => tool_list_changed / set_tool_list_changed,
        PromptListChanged(PromptListChangedNotification) => prompt_list_changed / set_prompt_list_changed,
    }
}

one_of! {
    /// Results a server may return.
    pub enum ServerResult {
        Initialize(InitializeResult) => initialize / set_initialize,
        ListResources(ListResourcesResult) => list_resources / set_list_resources,
        ListResourceTemplates(ListResourceTemplatesResult) => list_resource_templates / set_list_resource_templates,
        ReadResource(ReadResourceResult) => read_resource / set_read_resource,
        ListPrompts(ListPromptsResult) => list_prompts / set_list_prompts,
        GetPrompt(GetPromptResult) => get_prompt / set_get_prompt,
        ListTools(ListToolsResult) => list_tools / set_list_tools,
        CallTool(CallToolResult) => call_tool / set_call_tool,
        Complete(CompleteResult) => complete / set_complete,
        Empty(EmptyResult) => empty_result / set_empty_result,
    }
}

/// Rebuild the `{method, params}` object a request or notification payload
/// union is decoded from.
fn method_object(method: &str, params: Option<&Value>) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("method".to_string(), Value::String(method.to_string()));
    if let Some(params) = params {
        obj.insert("params".to_string(), params.clone());
    }
    obj
}

/// Decode a request envelope into a request union, if the union knows its method.
///
/// Returns `None` for methods outside the union (for example experimental
/// methods with their own handler) so the caller can route them untyped.
pub fn decode_request<V: Variants>(request: &Request) -> Option<Result<OneOf<V>, PayloadError>> {
    let obj = method_object(&request.method, request.params.as_ref());
    V::recognizes(&obj).then(|| OneOf::decode_object(&obj))
}

/// Decode a notification envelope into a notification union, if the union knows its method.
pub fn decode_notification<V: Variants>(notification: &Notification) -> Option<Result<OneOf<V>, PayloadError>> {
    let obj = method_object(&notification.method, notification.params.as_ref());
    V::recognizes(&obj).then(|| OneOf::decode_object(&obj))
}
