//! Document tree and atomic transaction core.
//!
//! # Responsibility
//! - Own the root node sequence of one document.
//! - Resolve flattened positions and apply transactions all-or-nothing.
//! - Encode/decode the persisted JSON shape and migrate legacy documents.
//!
//! # Invariants
//! - A `Document` is never mutated in place by edits: `apply` builds a new
//!   tree and the caller installs it.
//! - Position `0` is the start of the root content; `size()` is its end.

use crate::model::node::{check_node, content_size, Node, NodeType, SceneNode, SchemaViolation};
use crate::model::scene::SceneId;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fragment;
pub mod history;
pub mod migration;
pub mod position;
pub mod transaction;
pub mod wire;

/// Invalid tree coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// Position lies past the end of the document.
    OutOfRange { pos: usize, size: usize },
    /// Range end precedes its start.
    InvertedRange { from: usize, to: usize },
    /// Range endpoints live in different parent nodes.
    CrossesNodeBoundary { from: usize, to: usize },
    /// Position falls inside an atomic leaf.
    InsideLeaf { pos: usize },
    /// Position falls inside a text run where a node boundary is required.
    InsideText { pos: usize },
    /// No node starts at this position.
    NoNodeAt { pos: usize },
    /// Position is not between two top-level scenes.
    NotSceneBoundary { pos: usize },
    /// Position is not inside any scene.
    NotInScene { pos: usize },
    /// Position is not inside a paragraph or heading.
    NotInTextblock { pos: usize },
    /// Scene has no predecessor to merge into.
    NoPreviousScene(SceneId),
}

impl Display for PositionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { pos, size } => {
                write!(f, "position {pos} is outside document of size {size}")
            }
            Self::InvertedRange { from, to } => write!(f, "range {from}..{to} is inverted"),
            Self::CrossesNodeBoundary { from, to } => {
                write!(f, "range {from}..{to} crosses a node boundary")
            }
            Self::InsideLeaf { pos } => write!(f, "position {pos} is inside an atomic node"),
            Self::InsideText { pos } => write!(f, "position {pos} is inside a text run"),
            Self::NoNodeAt { pos } => write!(f, "no node starts at position {pos}"),
            Self::NotSceneBoundary { pos } => {
                write!(f, "position {pos} is not a scene boundary")
            }
            Self::NotInScene { pos } => write!(f, "position {pos} is not inside a scene"),
            Self::NotInTextblock { pos } => {
                write!(f, "position {pos} is not inside a paragraph or heading")
            }
            Self::NoPreviousScene(id) => write!(f, "scene {id} has no previous scene"),
        }
    }
}

impl Error for PositionError {}

/// Failure of a tree edit; the prior tree is always left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    Position(PositionError),
    Schema(SchemaViolation),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Position(err) => Some(err),
            Self::Schema(err) => Some(err),
        }
    }
}

impl From<PositionError> for TreeError {
    fn from(value: PositionError) -> Self {
        Self::Position(value)
    }
}

impl From<SchemaViolation> for TreeError {
    fn from(value: SchemaViolation) -> Self {
        Self::Schema(value)
    }
}

/// Where one scene sits in the document.
#[derive(Debug, Clone, Copy)]
pub struct ScenePlacement<'a> {
    /// 1-based scene number, derived from document order.
    pub ordinal: usize,
    /// Index among the root's children.
    pub index: usize,
    /// Position before the scene's open token.
    pub from: usize,
    /// Position after the scene's close token.
    pub to: usize,
    pub scene: &'a SceneNode,
}

impl ScenePlacement<'_> {
    /// First position inside the scene's content.
    pub fn content_start(&self) -> usize {
        self.from + 1
    }

    /// Last position inside the scene's content.
    pub fn content_end(&self) -> usize {
        self.to - 1
    }
}

/// Root of a document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    content: Vec<Node>,
}

impl Document {
    /// Creates a document with no content and no scenes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a document after checking the root contract.
    pub fn from_nodes(content: Vec<Node>) -> Result<Self, SchemaViolation> {
        for node in &content {
            check_node(NodeType::Doc, node)?;
        }
        Ok(Self { content })
    }

    /// Builds a document without contract checks; decode and migration only.
    pub(crate) fn from_nodes_unchecked(content: Vec<Node>) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    pub(crate) fn content_mut(&mut self) -> &mut Vec<Node> {
        &mut self.content
    }

    /// Size of the root content in positions.
    pub fn size(&self) -> usize {
        content_size(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Scenes in document order with derived numbering.
    pub fn scenes(&self) -> impl Iterator<Item = ScenePlacement<'_>> + '_ {
        let mut pos = 0;
        let mut ordinal = 0;
        self.content
            .iter()
            .enumerate()
            .filter_map(move |(index, node)| {
                let from = pos;
                pos += node.size();
                let scene = node.as_scene()?;
                ordinal += 1;
                Some(ScenePlacement {
                    ordinal,
                    index,
                    from,
                    to: pos,
                    scene,
                })
            })
    }

    pub fn find_scene(&self, id: SceneId) -> Option<ScenePlacement<'_>> {
        self.scenes().find(|placement| placement.scene.id() == id)
    }

    /// Scene whose content contains `pos`, if any.
    pub fn scene_at(&self, pos: usize) -> Option<ScenePlacement<'_>> {
        self.scenes()
            .find(|placement| placement.from < pos && pos < placement.to)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes().count()
    }

    pub fn has_scenes(&self) -> bool {
        self.content.iter().any(|node| node.as_scene().is_some())
    }

    pub fn scene_ids(&self) -> Vec<SceneId> {
        self.scenes().map(|placement| placement.scene.id()).collect()
    }

    /// Plain text of the whole document, one line per textblock.
    pub fn text_content(&self) -> String {
        fragment::plain_text(&self.content)
    }

    /// First violation of the scene partition rules, if any.
    ///
    /// An empty document is partitioned. Otherwise every root child must be a
    /// scene with non-empty content and a unique id.
    pub fn partition_violation(&self) -> Option<SchemaViolation> {
        let mut seen = HashSet::new();
        for (index, node) in self.content.iter().enumerate() {
            let Some(scene) = node.as_scene() else {
                return Some(SchemaViolation::LooseTopLevelBlock {
                    index,
                    found: node.node_type(),
                });
            };
            if scene.content.is_empty() {
                return Some(SchemaViolation::EmptyContent(NodeType::Scene));
            }
            if !seen.insert(scene.id()) {
                return Some(SchemaViolation::DuplicateSceneId(scene.id()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::Document;
    use crate::model::node::{Node, SceneNode};
    use crate::model::scene::SceneAttrs;

    fn scene(text: &str) -> Node {
        Node::Scene(SceneNode::new(SceneAttrs::new(), vec![Node::paragraph(text)]))
    }

    #[test]
    fn scenes_report_ordinals_and_ranges() {
        let doc = Document::from_nodes(vec![scene("ab"), scene("xyz")]).expect("valid doc");
        let placements: Vec<_> = doc.scenes().collect();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].ordinal, 1);
        assert_eq!((placements[0].from, placements[0].to), (0, 6));
        assert_eq!(placements[1].ordinal, 2);
        assert_eq!((placements[1].from, placements[1].to), (6, 13));
        assert_eq!(doc.size(), 13);
    }

    #[test]
    fn scene_at_excludes_boundaries() {
        let doc = Document::from_nodes(vec![scene("ab"), scene("xyz")]).expect("valid doc");
        assert!(doc.scene_at(0).is_none());
        assert!(doc.scene_at(6).is_none());
        assert_eq!(doc.scene_at(3).map(|p| p.ordinal), Some(1));
        assert_eq!(doc.scene_at(8).map(|p| p.ordinal), Some(2));
    }

    #[test]
    fn loose_blocks_violate_partition() {
        let doc = Document::from_nodes(vec![scene("a"), Node::paragraph("loose")])
            .expect("root accepts legacy blocks");
        assert!(doc.partition_violation().is_some());
        assert!(Document::empty().partition_violation().is_none());
    }
}
