//! Responder definitions.
//!
//! A responder turns a resource id into a worker command and labels the
//! result with a media type. Alternates are further responders reached by
//! their own suffix, or by content negotiation on the parent's suffix.

use serde::Serialize;

use crate::config::ResponderConfig;

/// Replaced by the resource id in a responder command.
pub const RESOURCE_PLACEHOLDER: &str = "{resource}";

/// True when `resource_id` can be substituted into a worker command without
/// changing its structure: no clause separator, no quotes, no backslash and no
/// control characters.
pub fn is_valid_resource_id(resource_id: &str) -> bool {
    !resource_id.is_empty()
        && !resource_id
            .chars()
            .any(|c| matches!(c, ';' | '"' | '\'' | '\\') || c.is_control())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponderNode {
    pub name: String,
    pub suffix: String,
    pub media_type: String,
    pub command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<ResponderNode>,
}

impl ResponderNode {
    pub fn new(
        name: impl Into<String>,
        suffix: impl Into<String>,
        media_type: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
            media_type: media_type.into(),
            command: command.into(),
            alternates: Vec::new(),
        }
    }

    pub fn with_alternate(mut self, alternate: ResponderNode) -> Self {
        self.alternates.push(alternate);
        self
    }

    pub fn from_config(config: &ResponderConfig) -> Self {
        Self {
            name: config.name.clone(),
            suffix: config.suffix.clone(),
            media_type: config.media_type.clone(),
            command: config.command.clone(),
            alternates: config.alternates.iter().map(Self::from_config).collect(),
        }
    }

    /// The command sent to a worker for `resource_id`.
    ///
    /// Callers must pass an id accepted by [`is_valid_resource_id`].
    pub fn worker_request(&self, resource_id: &str) -> String {
        self.command.replace(RESOURCE_PLACEHOLDER, resource_id)
    }

    /// Follow child indices down from this node.
    pub fn descendant(&self, path: &[usize]) -> Option<&ResponderNode> {
        path.iter()
            .try_fold(self, |node, &index| node.alternates.get(index))
    }

    /// Number of nodes in this subtree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.alternates.iter().map(Self::node_count).sum::<usize>()
    }
}
