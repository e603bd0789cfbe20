//! Method names of the Model Context Protocol.
//!
//! Dispatch is keyed by the raw method string, so custom methods keep working;
//! this table names the methods the session itself knows about.

use schemars::JsonSchema;
use serde::{ Deserialize, Serialize };
use std::fmt::{ self, Display };

use crate::errors::Error;

/// Represents the methods defined in the Model Context Protocol (MCP).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum Method {
    #[serde(rename = "initialize")]
    Initialize,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "notifications/initialized")]
    NotificationsInitialized,
    #[serde(rename = "notifications/progress")]
    NotificationsProgress,
    #[serde(rename = "notifications/cancelled")]
    NotificationsCancelled,
    #[serde(rename = "resources/list")]
    ResourcesList,
    #[serde(rename = "resources/templates/list")]
    ResourcesTemplatesList,
    #[serde(rename = "resources/read")]
    ResourcesRead,
    #[serde(rename = "resources/subscribe")]
    ResourcesSubscribe,
    #[serde(rename = "resources/unsubscribe")]
    ResourcesUnsubscribe,
    #[serde(rename = "notifications/resources/list_changed")]
    NotificationsResourcesListChanged,
    #[serde(rename = "notifications/resources/updated")]
    NotificationsResourcesUpdated,
    #[serde(rename = "prompts/list")]
    PromptsList,
    #[serde(rename = "prompts/get")]
    PromptsGet,
    #[serde(rename = "notifications/prompts/list_changed")]
    NotificationsPromptsListChanged,
    #[serde(rename = "tools/list")]
    ToolsList,
    #[serde(rename = "tools/call")]
    ToolsCall,
    #[serde(rename = "notifications/tools/list_changed")]
    NotificationsToolsListChanged,
    #[serde(rename = "sampling/createMessage")]
    SamplingCreateMessage,
    #[serde(rename = "logging/setLevel")]
    LoggingSetLevel,
    #[serde(rename = "notifications/message")]
    NotificationsMessage,
    #[serde(rename = "completion/complete")]
    CompletionComplete,
    #[serde(rename = "roots/list")]
    RootsList,
    #[serde(rename = "notifications/roots/list_changed")]
    NotificationsRootsListChanged,
}

impl Method {
    /// Every known method, requests first
    pub const ALL: [Method; 24] = [
        Method::Initialize,
        Method::Ping,
        Method::ResourcesList,
        Method::ResourcesTemplatesList,
        Method::ResourcesRead,
        Method::ResourcesSubscribe,
        Method::ResourcesUnsubscribe,
        Method::PromptsList,
        Method::PromptsGet,
        Method::ToolsList,
        Method::ToolsCall,
        Method::SamplingCreateMessage,
        Method::LoggingSetLevel,
        Method::CompletionComplete,
        Method::RootsList,
        Method::NotificationsInitialized,
        Method::NotificationsProgress,
        Method::NotificationsCancelled,
        Method::NotificationsResourcesListChanged,
        Method::NotificationsResourcesUpdated,
        Method::NotificationsPromptsListChanged,
        Method::NotificationsToolsListChanged,
        Method::NotificationsMessage,
        Method::NotificationsRootsListChanged,
    ];

    /// Get the string representation of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Ping => "ping",
            Method::NotificationsInitialized => "notifications/initialized",
            Method::NotificationsProgress => "notifications/progress",
            Method::NotificationsCancelled => "notifications/cancelled",
            Method::ResourcesList => "resources/list",
            Method::ResourcesTemplatesList => "resources/templates/list",
            Method::ResourcesRead => "resources/read",
            Method::ResourcesSubscribe => "resources/subscribe",
            Method::ResourcesUnsubscribe => "resources/unsubscribe",
            Method::NotificationsResourcesListChanged => "notifications/resources/list_changed",
            Method::NotificationsResourcesUpdated => "notifications/resources/updated",
            Method::PromptsList => "prompts/list",
            Method::PromptsGet => "prompts/get",
            Method::NotificationsPromptsListChanged => "notifications/prompts/list_changed",
            Method::ToolsList => "tools/list",
            Method::ToolsCall => "tools/call",
            Method::NotificationsToolsListChanged => "notifications/tools/list_changed",
            Method::SamplingCreateMessage => "sampling/createMessage",
            Method::LoggingSetLevel => "logging/setLevel",
            Method::NotificationsMessage => "notifications/message",
            Method::CompletionComplete => "completion/complete",
            Method::RootsList => "roots/list",
            Method::NotificationsRootsListChanged => "notifications/roots/list_changed",
        }
    }

    /// Check if this method is a notification
    pub fn is_notification(&self) -> bool {
        self.as_str().starts_with("notifications/")
    }

    /// Check if this method is a request that requires a response
    pub fn is_request(&self) -> bool {
        !self.is_notification()
    }

    /// Methods that are legal before initialization has finished
    pub fn allowed_before_init(&self) -> bool {
        matches!(self, Method::Initialize | Method::Ping)
    }

    /// Notifications that announce a change rather than answer anything
    pub fn is_change_notification(&self) -> bool {
        matches!(
            self,
            Method::NotificationsResourcesListChanged |
                Method::NotificationsResourcesUpdated |
                Method::NotificationsPromptsListChanged |
                Method::NotificationsToolsListChanged |
                Method::NotificationsRootsListChanged
        )
    }

    /// Determines if the method is client-to-server, server-to-client, or bidirectional
    pub fn direction(&self) -> MethodDirection {
        match self {
            | Method::Initialize
            | Method::ResourcesList
            | Method::ResourcesTemplatesList
            | Method::ResourcesRead
            | Method::ResourcesSubscribe
            | Method::ResourcesUnsubscribe
            | Method::PromptsList
            | Method::PromptsGet
            | Method::ToolsList
            | Method::ToolsCall
            | Method::LoggingSetLevel
            | Method::CompletionComplete
            | Method::NotificationsInitialized
            | Method::NotificationsRootsListChanged => MethodDirection::ClientToServer,

            | Method::SamplingCreateMessage
            | Method::RootsList
            | Method::NotificationsResourcesListChanged
            | Method::NotificationsResourcesUpdated
            | Method::NotificationsPromptsListChanged
            | Method::NotificationsToolsListChanged
            | Method::NotificationsMessage => MethodDirection::ServerToClient,

            Method::Ping | Method::NotificationsProgress | Method::NotificationsCancelled =>
                MethodDirection::Bidirectional,
        }
    }
}

/// Indicates the direction of a method in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodDirection {
    ClientToServer,
    ServerToClient,
    Bidirectional,
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL.into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::MethodNotFound(s.to_string()))
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}
