//! Flattened position resolution.
//!
//! # Invariants
//! - Resolution is a pure function of the current tree.
//! - A resolved position always names a parent container; a position between
//!   two children has `text_offset == 0`.

use super::{Document, PositionError};
use crate::model::node::{Node, NodeType};

/// One container entered while resolving a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// Child index within the enclosing container.
    pub index: usize,
    /// Position of the container's open token.
    pub start: usize,
}

/// A position resolved against a concrete tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPos {
    pub pos: usize,
    /// Containers from the root down to the parent; empty means the root.
    pub path: Vec<PathStep>,
    /// Index of the child at (or containing) the position.
    pub index: usize,
    /// Char offset inside the text run at `index`; zero on node boundaries.
    pub text_offset: usize,
}

impl ResolvedPos {
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// First position inside the parent container.
    pub fn content_start(&self) -> usize {
        self.path.last().map_or(0, |step| step.start + 1)
    }

    pub fn at_boundary(&self) -> bool {
        self.text_offset == 0
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.path == other.path
    }

    /// Type of the innermost container holding the position.
    pub fn parent_type(&self, doc: &Document) -> NodeType {
        let mut nodes = doc.content();
        let mut parent = NodeType::Doc;
        for step in &self.path {
            let Some(node) = nodes.get(step.index) else {
                break;
            };
            parent = node.node_type();
            nodes = node.children().unwrap_or_default();
        }
        parent
    }
}

impl Document {
    /// Resolves `pos` to a parent container and child index.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, PositionError> {
        let size = self.size();
        if pos > size {
            return Err(PositionError::OutOfRange { pos, size });
        }

        let mut path = Vec::new();
        let mut nodes: &[Node] = self.content();
        let mut content_start = 0;
        loop {
            let rel = pos - content_start;
            let mut offset = 0;
            let mut hit = None;
            for (index, node) in nodes.iter().enumerate() {
                let node_size = node.size();
                if rel < offset + node_size {
                    hit = Some((index, rel - offset));
                    break;
                }
                offset += node_size;
            }

            let Some((index, inner)) = hit else {
                return Ok(ResolvedPos {
                    pos,
                    path,
                    index: nodes.len(),
                    text_offset: 0,
                });
            };
            if inner == 0 {
                return Ok(ResolvedPos {
                    pos,
                    path,
                    index,
                    text_offset: 0,
                });
            }

            let node = &nodes[index];
            match node.children() {
                Some(children) => {
                    let start = content_start + offset;
                    path.push(PathStep { index, start });
                    nodes = children;
                    content_start = start + 1;
                }
                None if node.node_type() == NodeType::Text => {
                    return Ok(ResolvedPos {
                        pos,
                        path,
                        index,
                        text_offset: inner,
                    });
                }
                None => return Err(PositionError::InsideLeaf { pos }),
            }
        }
    }
}

/// Walks `path` down from the root content, yielding the parent type and its
/// mutable children.
pub(crate) fn container_mut<'a>(
    root: &'a mut Vec<Node>,
    path: &[PathStep],
) -> Result<(NodeType, &'a mut Vec<Node>), PositionError> {
    let mut parent = NodeType::Doc;
    let mut nodes = root;
    for step in path {
        let node = match nodes.get_mut(step.index) {
            Some(node) => node,
            None => return Err(PositionError::NoNodeAt { pos: step.start }),
        };
        parent = node.node_type();
        nodes = match node.children_mut() {
            Some(children) => children,
            None => return Err(PositionError::InsideLeaf { pos: step.start }),
        };
    }
    Ok((parent, nodes))
}
