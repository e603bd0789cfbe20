//! Cursor-based pagination
//!
//! List requests take an optional `cursor`; list results return an optional
//! `nextCursor`. A missing (or `null`) `nextCursor` means there are no more
//! pages. Cursors are opaque and must be sent back exactly as received.

use std::future::Future;

use schemars::JsonSchema;
use serde::{ Deserialize, Serialize };

use crate::errors::Error;
use crate::protocol::types::{
    ListPromptsResult,
    ListResourceTemplatesResult,
    ListResourcesResult,
    ListToolsResult,
    Meta,
    Prompt,
    Resource,
    ResourceTemplate,
    Tool,
};

/// An opaque token used to represent a cursor for pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Cursor(token.to_string())
    }
}

/// Params shared by every list request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedParams {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    /// Where to continue listing from; absent for the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl PaginatedParams {
    pub fn from_cursor(cursor: Option<Cursor>) -> Self {
        Self { meta: None, cursor }
    }
}

/// A list result that may continue on another page
pub trait Paginated {
    type Item;

    fn next_cursor(&self) -> Option<&Cursor>;

    fn into_items(self) -> Vec<Self::Item>;
}

macro_rules! paginated {
    ($result:ty, $item:ty, $field:ident) => {
        impl Paginated for $result {
            type Item = $item;

            fn next_cursor(&self) -> Option<&Cursor> {
                self.next_cursor.as_ref()
            }

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}

paginated!(ListToolsResult, Tool, tools);
paginated!(ListResourcesResult, Resource, resources);
paginated!(ListResourceTemplatesResult, ResourceTemplate, resource_templates);
paginated!(ListPromptsResult, Prompt, prompts);

/// Fetch pages until the result has no `nextCursor`, concatenating the items.
///
/// `fetch` is called with `None` for the first page and then with each
/// returned cursor, verbatim. Items are not deduplicated; pages are not
/// snapshot-isolated.
pub async fn collect_pages<R, F, Fut>(mut fetch: F) -> Result<Vec<R::Item>, Error>
    where R: Paginated, F: FnMut(Option<Cursor>) -> Fut, Fut: Future<Output = Result<R, Error>>
{
    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch(cursor.take()).await?;
        let next = page.next_cursor().cloned();
        items.extend(page.into_items());
        match next {
            Some(next) => {
                cursor = Some(next);
            }
            None => {
                return Ok(items);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: None,
            input_schema: json!({ "type": "object" }),
        }
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let mut seen = Vec::new();
        let tools = collect_pages(|cursor: Option<Cursor>| {
            seen.push(cursor.clone());
            async move {
                let page = match cursor.as_ref().map(Cursor::as_str) {
                    None => ListToolsResult {
                        meta: None,
                        next_cursor: Some(Cursor::new("abc")),
                        tools: vec![tool("a")],
                    },
                    Some("abc") => ListToolsResult {
                        meta: None,
                        next_cursor: None,
                        tools: vec![tool("b"), tool("c")],
                    },
                    Some(other) => panic!("unexpected cursor {other}"),
                };
                Ok(page)
            }
        }).await.unwrap();

        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(seen, [None, Some(Cursor::new("abc"))]);
    }

    #[tokio::test]
    async fn stops_on_first_error() {
        let result = collect_pages(|_cursor| async {
            Err::<ListPromptsResult, _>(Error::SessionClosed)
        }).await;
        assert!(matches!(result, Err(Error::SessionClosed)));
    }

    #[test]
    fn cursor_is_a_bare_string_on_the_wire() {
        let params = PaginatedParams::from_cursor(Some(Cursor::new("abc")));
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({ "cursor": "abc" }));
        assert_eq!(serde_json::to_value(PaginatedParams::default()).unwrap(), json!({}));
    }
}
