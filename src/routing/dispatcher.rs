//! Responder lookup and dispatch.
//!
//! # Responsibilities
//! - Hold top-level responders in registration (priority) order
//! - Resolve a request path to a responder and resource id
//! - Negotiate between a responder and its alternates on `Accept`
//!
//! # Design Decisions
//! - Immutable after construction; reload builds a new dispatcher
//! - First top-level responder whose subtree matches wins
//! - Explicit `NoMatch` rather than a silent default

use thiserror::Error;

use crate::config::ResponderConfig;
use crate::routing::matcher::SuffixMatcher;
use crate::routing::media_type;
use crate::routing::responder::{self, ResponderNode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no responder matches '{0}'")]
    NoMatch(String),

    #[error("responder '{responder}' has no representation acceptable for '{accept}'")]
    NotAcceptable { responder: String, accept: String },

    #[error("resource id '{0}' contains characters a worker command cannot carry")]
    InvalidResource(String),
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Top-level responder whose subtree matched.
    pub root: &'a ResponderNode,
    /// The node whose suffix matched.
    pub responder: &'a ResponderNode,
    pub resource_id: String,
    /// True when the path named an alternate's own suffix.
    pub via_alternate: bool,
}

impl<'a> Resolution<'a> {
    /// Pick the representation to serve.
    ///
    /// An alternate named in the path is served as is. Otherwise, with an
    /// `Accept` header, the matched node and its direct alternates compete;
    /// ties favor the matched node.
    pub fn negotiate(&self, accept: Option<&str>) -> Result<&'a ResponderNode, DispatchError> {
        let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
            return Ok(self.responder);
        };
        if self.via_alternate {
            return Ok(self.responder);
        }

        let options: Vec<&'a ResponderNode> = std::iter::once(self.responder)
            .chain(self.responder.alternates.iter())
            .collect();
        let media_types: Vec<&str> = options.iter().map(|n| n.media_type.as_str()).collect();
        let ranges = media_type::parse_accept(accept);

        match media_type::best_match(&ranges, &media_types) {
            Some(index) => Ok(options[index]),
            None => Err(DispatchError::NotAcceptable {
                responder: self.responder.name.clone(),
                accept: accept.to_string(),
            }),
        }
    }
}

/// Ordered set of responder trees with their compiled matchers.
#[derive(Debug, Default)]
pub struct Dispatcher {
    entries: Vec<(ResponderNode, SuffixMatcher)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(responders: &[ResponderConfig]) -> Self {
        let mut dispatcher = Self::new();
        for config in responders {
            dispatcher.register(ResponderNode::from_config(config));
        }
        tracing::debug!(responders = dispatcher.entries.len(), "Dispatcher built");
        dispatcher
    }

    /// Append a top-level responder. Earlier registrations take priority.
    pub fn register(&mut self, node: ResponderNode) {
        let matcher = SuffixMatcher::compile(&node);
        self.entries.push((node, matcher));
    }

    pub fn responders(&self) -> impl Iterator<Item = &ResponderNode> {
        self.entries.iter().map(|(node, _)| node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the responder for `path`. Leading slashes are not part of the
    /// resource id, and ids that would alter the worker command are refused.
    pub fn resolve(&self, path: &str) -> Result<Resolution<'_>, DispatchError> {
        let relative = path.trim_start_matches('/');
        for (root, matcher) in &self.entries {
            let Some(found) = matcher.find(relative) else {
                continue;
            };
            let Some(responder) = root.descendant(found.node_path) else {
                continue;
            };
            if !responder::is_valid_resource_id(found.resource_id) {
                tracing::warn!(path = %path, "Refusing resource id unsafe for a worker command");
                return Err(DispatchError::InvalidResource(found.resource_id.to_string()));
            }
            tracing::trace!(path = %path, responder = %responder.name, "Path resolved");
            return Ok(Resolution {
                root,
                responder,
                resource_id: found.resource_id.to_string(),
                via_alternate: !found.node_path.is_empty(),
            });
        }
        Err(DispatchError::NoMatch(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DMR_XML: &str = "application/vnd.opendap.dap4.dataset-metadata+xml";

    fn dispatcher() -> Dispatcher {
        let mut d = Dispatcher::new();
        d.register(
            ResponderNode::new("dmr", ".dmr", DMR_XML, "show dmr {resource};")
                .with_alternate(ResponderNode::new("dmr-html", ".dmr.html", "text/html", "show dmr-html {resource};"))
                .with_alternate(ResponderNode::new("dmr-rdf", ".dmr.rdf", "application/rdf+xml", "show rdf {resource};")),
        );
        d.register(
            ResponderNode::new("iso", ".dmr.iso", "text/xml", "show iso {resource};")
                .with_alternate(ResponderNode::new("rubric", ".dmr.iso.rubric", "text/html", "show rubric {resource};")),
        );
        d.register(ResponderNode::new("any-iso", ".iso", "text/xml", "show {resource};"));
        d
    }

    #[test]
    fn test_resolve_normative() {
        let d = dispatcher();
        let r = d.resolve("/data/fnoc1.nc.dmr").unwrap();
        assert_eq!(r.responder.name, "dmr");
        assert_eq!(r.resource_id, "data/fnoc1.nc");
        assert!(!r.via_alternate);
        assert_eq!(r.responder.worker_request(&r.resource_id), "show dmr data/fnoc1.nc;");
    }

    #[test]
    fn test_resolve_alternate_over_shorter_suffix() {
        let d = dispatcher();
        let r = d.resolve("/x.nc.dmr.iso.rubric").unwrap();
        assert_eq!(r.root.name, "iso");
        assert_eq!(r.responder.name, "rubric");
        assert_eq!(r.resource_id, "x.nc");
        assert!(r.via_alternate);

        let r = d.resolve("/x.nc.dmr.iso").unwrap();
        assert_eq!(r.responder.name, "iso");
        assert_eq!(r.resource_id, "x.nc");
    }

    #[test]
    fn test_registration_order_is_priority() {
        let d = dispatcher();
        // ".dmr.iso" is registered before ".iso"
        assert_eq!(d.resolve("/a.dmr.iso").unwrap().root.name, "iso");
        assert_eq!(d.resolve("/a.iso").unwrap().root.name, "any-iso");
    }

    #[test]
    fn test_no_match() {
        let d = dispatcher();
        assert_eq!(
            d.resolve("/data/fnoc1.nc.xyz").unwrap_err(),
            DispatchError::NoMatch("/data/fnoc1.nc.xyz".to_string())
        );
        assert!(matches!(d.resolve("/.dmr"), Err(DispatchError::NoMatch(_))));
        assert!(matches!(Dispatcher::new().resolve("/a.dmr"), Err(DispatchError::NoMatch(_))));
    }

    #[test]
    fn test_resource_id_cannot_inject_commands() {
        let d = dispatcher();
        assert_eq!(
            d.resolve("/a; delete container x; show x.dmr").unwrap_err(),
            DispatchError::InvalidResource("a; delete container x; show x".to_string())
        );
        for path in ["/a\"b.dmr", "/a'b.dmr", "/a\\b.dmr", "/a\nb.dmr"] {
            assert!(
                matches!(d.resolve(path), Err(DispatchError::InvalidResource(_))),
                "{path:?} accepted"
            );
        }

        let r = d.resolve("/data/with space/f-1_v2.nc.dmr").unwrap();
        assert_eq!(
            r.responder.worker_request(&r.resource_id),
            "show dmr data/with space/f-1_v2.nc;"
        );
    }

    #[test]
    fn test_case_insensitive_suffix() {
        let d = dispatcher();
        let r = d.resolve("/Data/File.DMR.HTML").unwrap();
        assert_eq!(r.responder.name, "dmr-html");
        assert_eq!(r.resource_id, "Data/File");
    }

    #[test]
    fn test_negotiation() {
        let d = dispatcher();
        let r = d.resolve("/a.nc.dmr").unwrap();

        assert_eq!(r.negotiate(None).unwrap().name, "dmr");
        assert_eq!(r.negotiate(Some("text/html")).unwrap().name, "dmr-html");
        assert_eq!(r.negotiate(Some("*/*")).unwrap().name, "dmr");
        assert_eq!(
            r.negotiate(Some("application/*;q=0.5, text/html;q=0.4")).unwrap().name,
            "dmr"
        );
        assert_eq!(
            r.negotiate(Some("image/png")).unwrap_err(),
            DispatchError::NotAcceptable {
                responder: "dmr".to_string(),
                accept: "image/png".to_string(),
            }
        );
    }

    #[test]
    fn test_alternate_in_path_skips_negotiation() {
        let d = dispatcher();
        let r = d.resolve("/a.nc.dmr.rdf").unwrap();
        assert_eq!(r.negotiate(Some("text/html")).unwrap().name, "dmr-rdf");
    }
}
