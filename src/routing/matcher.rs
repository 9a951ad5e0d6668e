//! Suffix matching.
//!
//! # Responsibilities
//! - Compile one matcher per top-level responder over its own suffix and
//!   every descendant suffix
//! - Anchor matches at the end of the path, ASCII-case-insensitive
//!
//! # Design Decisions
//! - Longest suffix is tried first, so `.iso` never masks `.iso.rubric`
//! - No regex; one byte comparison per candidate suffix
//! - A match must leave a non-empty resource id

/// A successful match: which node and what remains of the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixMatch<'m, 'p> {
    /// Child indices from the top-level node; empty for the node itself.
    pub node_path: &'m [usize],
    pub resource_id: &'p str,
}

#[derive(Debug, Clone)]
struct Candidate {
    suffix: String,
    node_path: Vec<usize>,
}

/// Anchored matcher for one responder subtree.
#[derive(Debug, Clone, Default)]
pub struct SuffixMatcher {
    candidates: Vec<Candidate>,
}

impl SuffixMatcher {
    /// Build the matcher for `node` and all of its alternates.
    pub fn compile(node: &crate::routing::ResponderNode) -> Self {
        let mut candidates = Vec::with_capacity(node.node_count());
        collect(node, &mut Vec::new(), &mut candidates);
        candidates.sort_by(|a, b| b.suffix.len().cmp(&a.suffix.len()));
        Self { candidates }
    }

    /// Suffixes in the order they are tried.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.suffix.as_str())
    }

    pub fn find<'m, 'p>(&'m self, path: &'p str) -> Option<SuffixMatch<'m, 'p>> {
        self.candidates.iter().find_map(|candidate| {
            let start = path.len().checked_sub(candidate.suffix.len())?;
            if start == 0 || !path.is_char_boundary(start) {
                return None;
            }
            if !path.as_bytes()[start..].eq_ignore_ascii_case(candidate.suffix.as_bytes()) {
                return None;
            }
            Some(SuffixMatch {
                node_path: &candidate.node_path,
                resource_id: &path[..start],
            })
        })
    }
}

fn collect(node: &crate::routing::ResponderNode, path: &mut Vec<usize>, out: &mut Vec<Candidate>) {
    for (index, alternate) in node.alternates.iter().enumerate() {
        path.push(index);
        collect(alternate, path, out);
        path.pop();
    }
    if !node.suffix.is_empty() {
        out.push(Candidate {
            suffix: node.suffix.clone(),
            node_path: path.clone(),
        });
    }
}
