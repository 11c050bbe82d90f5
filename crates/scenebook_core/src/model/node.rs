//! Document node model and allowed-content contracts.
//!
//! # Responsibility
//! - Define the typed node tree: blocks, inline atoms and text runs.
//! - Declare which node types each container accepts as children.
//! - Provide size arithmetic for the flattened position stream.
//!
//! # Invariants
//! - A container occupies `content_size + 2` positions (open and close token).
//! - A text run occupies one position per `char`; atoms occupy exactly one.
//! - Text runs inside a textblock are never empty and adjacent runs never
//!   share an identical mark set (see [`normalize_inline`]).

use crate::model::entity::{EntityId, EntityMarkAttrs, MentionAttrs};
use crate::model::scene::{SceneAttrs, SceneId};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeVariant {
    /// Container with ordered children.
    Block,
    /// Leaf with attributes, embedded in text flow.
    Inline,
    /// Text run with marks.
    Text,
}

/// Concrete node type, including the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Doc,
    Scene,
    Paragraph,
    Heading,
    Blockquote,
    HorizontalRule,
    Mention,
    HardBreak,
    Text,
    /// Any wire type this crate does not model.
    Opaque,
}

impl NodeType {
    /// Stable wire `type` value.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Scene => "scene",
            Self::Paragraph => "paragraph",
            Self::Heading => "heading",
            Self::Blockquote => "blockquote",
            Self::HorizontalRule => "horizontalRule",
            Self::Mention => "mention",
            Self::HardBreak => "hardBreak",
            Self::Text => "text",
            Self::Opaque => "opaque",
        }
    }

    /// Known wire types only; anything else decodes as [`NodeType::Opaque`].
    pub fn from_wire_name(value: &str) -> Option<Self> {
        match value {
            "doc" => Some(Self::Doc),
            "scene" => Some(Self::Scene),
            "paragraph" => Some(Self::Paragraph),
            "heading" => Some(Self::Heading),
            "blockquote" => Some(Self::Blockquote),
            "horizontalRule" => Some(Self::HorizontalRule),
            "mention" => Some(Self::Mention),
            "hardBreak" => Some(Self::HardBreak),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn variant(self) -> NodeVariant {
        match self {
            Self::Mention | Self::HardBreak | Self::Opaque => NodeVariant::Inline,
            Self::Text => NodeVariant::Text,
            _ => NodeVariant::Block,
        }
    }

    /// Leaves have no children and no addressable interior.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::HorizontalRule | Self::Mention | Self::HardBreak | Self::Text | Self::Opaque
        )
    }

    /// Atoms are leaves occupying a single position.
    pub fn is_atom(self) -> bool {
        self.is_leaf() && self != Self::Text
    }

    /// Containers whose children are inline content.
    pub fn is_textblock(self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading)
    }

    /// Flow blocks may appear inside scenes and block quotes. Opaque nodes
    /// are accepted in both block and inline position.
    fn is_flow_block(self) -> bool {
        matches!(
            self,
            Self::Paragraph | Self::Heading | Self::Blockquote | Self::HorizontalRule | Self::Opaque
        )
    }

    /// Allowed-content contract.
    ///
    /// The root accepts scenes and, for legacy documents awaiting migration,
    /// loose flow blocks. Scenes never nest.
    pub fn allows(self, child: NodeType) -> bool {
        match self {
            Self::Doc => child == Self::Scene || child.is_flow_block(),
            Self::Scene | Self::Blockquote => child.is_flow_block(),
            Self::Paragraph | Self::Heading => child.variant() != NodeVariant::Block,
            Self::HorizontalRule
            | Self::Mention
            | Self::HardBreak
            | Self::Text
            | Self::Opaque => false,
        }
    }

    /// Containers that must keep at least one child.
    pub fn requires_content(self) -> bool {
        matches!(self, Self::Scene | Self::Blockquote)
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Content violates a node's allowed-children contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// Child type is not accepted by the parent.
    DisallowedChild { parent: NodeType, child: NodeType },
    /// Container would be left without children.
    EmptyContent(NodeType),
    /// Text runs must carry at least one character.
    EmptyText,
    /// Attribute payload does not belong to the target node type.
    AttrsMismatch { target: NodeType },
    /// Scene identity cannot be reassigned.
    SceneIdChanged { from: SceneId, to: SceneId },
    /// Same scene id appears twice.
    DuplicateSceneId(SceneId),
    /// Top-level node is not a scene in a partitioned document.
    LooseTopLevelBlock { index: usize, found: NodeType },
    /// Marks can only decorate text.
    MarkOutsideText,
}

impl Display for SchemaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DisallowedChild { parent, child } => {
                write!(f, "`{parent}` does not accept `{child}` content")
            }
            Self::EmptyContent(node_type) => write!(f, "`{node_type}` must not be empty"),
            Self::EmptyText => write!(f, "text nodes must not be empty"),
            Self::AttrsMismatch { target } => {
                write!(f, "attributes do not apply to `{target}` nodes")
            }
            Self::SceneIdChanged { from, to } => {
                write!(f, "scene id is immutable: {from} cannot become {to}")
            }
            Self::DuplicateSceneId(id) => write!(f, "duplicate scene id: {id}"),
            Self::LooseTopLevelBlock { index, found } => {
                write!(f, "top-level node {index} is `{found}`, expected `scene`")
            }
            Self::MarkOutsideText => write!(f, "marks can only be applied to text"),
        }
    }
}

impl Error for SchemaViolation {}

/// Text decoration applied over a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    /// Weak entity reference over a text range.
    Entity(EntityMarkAttrs),
    /// Generic formatting (bold, italic, link, ...), carried opaquely.
    Format { name: String, attrs: Option<Value> },
}

impl Mark {
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(attrs) => Some(&attrs.entity_id),
            Self::Format { .. } => None,
        }
    }

    /// Two marks decorate "the same thing" regardless of secondary attrs.
    ///
    /// Entity marks compare by entity id, formatting marks by name.
    pub fn same_target(&self, other: &Mark) -> bool {
        match (self, other) {
            (Self::Entity(left), Self::Entity(right)) => left.entity_id == right.entity_id,
            (Self::Format { name: left, .. }, Self::Format { name: right, .. }) => left == right,
            _ => false,
        }
    }
}

/// Text run with an ordered, duplicate-free mark set.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub marks: Vec<Mark>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Splits at a `char` offset; both halves keep the marks.
    pub fn split_at(&self, offset: usize) -> (TextRun, TextRun) {
        let byte = byte_offset(&self.text, offset);
        (
            TextRun {
                text: self.text[..byte].to_string(),
                marks: self.marks.clone(),
            },
            TextRun {
                text: self.text[byte..].to_string(),
                marks: self.marks.clone(),
            },
        )
    }

    pub fn add_mark(&mut self, mark: &Mark) {
        if !self.marks.contains(mark) {
            self.marks.push(mark.clone());
        }
    }

    pub fn remove_mark(&mut self, mark: &Mark) {
        self.marks.retain(|existing| !existing.same_target(mark));
    }

    fn same_marks(&self, other: &TextRun) -> bool {
        self.marks.len() == other.marks.len()
            && self.marks.iter().all(|mark| other.marks.contains(mark))
    }
}

/// Scene container: metadata plus flow content.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub attrs: SceneAttrs,
    pub content: Vec<Node>,
}

impl SceneNode {
    pub fn new(attrs: SceneAttrs, content: Vec<Node>) -> Self {
        Self { attrs, content }
    }

    /// A fresh scene holding one empty paragraph.
    pub fn blank(attrs: SceneAttrs) -> Self {
        Self::new(attrs, vec![Node::empty_paragraph()])
    }

    pub fn id(&self) -> SceneId {
        self.attrs.id
    }
}

/// Node of a wire type this crate does not model.
///
/// Kept as its raw JSON and treated as a one-position atom, so editing around
/// it never alters its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueNode {
    /// Wire `type` value.
    pub node_type: String,
    pub raw: Value,
}

/// One node of the document tree.
///
/// `attrs` on textblocks and quotes holds wire attributes this crate does not
/// interpret (alignment, ids, ...); heading `attrs` excludes `level`.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scene(SceneNode),
    Paragraph {
        content: Vec<Node>,
        attrs: Option<Value>,
    },
    Heading {
        level: u8,
        content: Vec<Node>,
        attrs: Option<Value>,
    },
    Blockquote {
        content: Vec<Node>,
        attrs: Option<Value>,
    },
    HorizontalRule,
    Mention(MentionAttrs),
    HardBreak,
    Text(TextRun),
    Opaque(OpaqueNode),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(TextRun::plain(value))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::empty_paragraph()
        } else {
            Self::paragraph_of(vec![Self::text(text)])
        }
    }

    pub fn paragraph_of(content: Vec<Node>) -> Self {
        Self::Paragraph {
            content,
            attrs: None,
        }
    }

    pub fn empty_paragraph() -> Self {
        Self::paragraph_of(Vec::new())
    }

    pub fn blockquote(content: Vec<Node>) -> Self {
        Self::Blockquote {
            content,
            attrs: None,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Scene(_) => NodeType::Scene,
            Self::Paragraph { .. } => NodeType::Paragraph,
            Self::Heading { .. } => NodeType::Heading,
            Self::Blockquote { .. } => NodeType::Blockquote,
            Self::HorizontalRule => NodeType::HorizontalRule,
            Self::Mention(_) => NodeType::Mention,
            Self::HardBreak => NodeType::HardBreak,
            Self::Text(_) => NodeType::Text,
            Self::Opaque(_) => NodeType::Opaque,
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Self::Scene(scene) => Some(&scene.content),
            Self::Paragraph { content, .. }
            | Self::Heading { content, .. }
            | Self::Blockquote { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Self::Scene(scene) => Some(&mut scene.content),
            Self::Paragraph { content, .. }
            | Self::Heading { content, .. }
            | Self::Blockquote { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Copy of this container with different children; leaves are returned as-is.
    pub fn with_children(&self, children: Vec<Node>) -> Node {
        let mut copy = match self {
            Self::Scene(scene) => Self::Scene(SceneNode::new(scene.attrs.clone(), Vec::new())),
            Self::Paragraph { attrs, .. } => Self::Paragraph {
                content: Vec::new(),
                attrs: attrs.clone(),
            },
            Self::Heading { level, attrs, .. } => Self::Heading {
                level: *level,
                content: Vec::new(),
                attrs: attrs.clone(),
            },
            Self::Blockquote { attrs, .. } => Self::Blockquote {
                content: Vec::new(),
                attrs: attrs.clone(),
            },
            leaf => return leaf.clone(),
        };
        if let Some(content) = copy.children_mut() {
            *content = children;
        }
        copy
    }

    pub fn as_scene(&self) -> Option<&SceneNode> {
        match self {
            Self::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    /// Number of positions this node occupies in the flattened stream.
    pub fn size(&self) -> usize {
        match self {
            Self::Text(run) => run.char_len(),
            _ => match self.children() {
                Some(children) => content_size(children) + 2,
                None => 1,
            },
        }
    }

    /// Concatenated text of this subtree; mentions contribute their label.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(run) => out.push_str(&run.text),
            Self::Mention(attrs) => out.push_str(&attrs.label),
            Self::HardBreak => out.push('\n'),
            _ => {
                for child in self.children().unwrap_or_default() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Visits this node and every descendant in document order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        if let Some(children) = self.children() {
            for child in children {
                child.walk(visit);
            }
        }
    }
}

/// Total size of a child sequence.
pub fn content_size(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::size).sum()
}

/// Checks `children` against the contract of `parent`, recursing into subtrees.
pub fn check_content(parent: NodeType, children: &[Node]) -> Result<(), SchemaViolation> {
    if children.is_empty() && parent.requires_content() {
        return Err(SchemaViolation::EmptyContent(parent));
    }
    for child in children {
        check_node(parent, child)?;
    }
    Ok(())
}

/// Checks one node placed under `parent`.
pub fn check_node(parent: NodeType, node: &Node) -> Result<(), SchemaViolation> {
    let child_type = node.node_type();
    if !parent.allows(child_type) {
        return Err(SchemaViolation::DisallowedChild {
            parent,
            child: child_type,
        });
    }
    match node {
        Node::Text(run) if run.text.is_empty() => Err(SchemaViolation::EmptyText),
        _ => match node.children() {
            Some(children) => check_content(child_type, children),
            None => Ok(()),
        },
    }
}

/// Drops empty text runs and merges neighbours with identical marks.
pub fn normalize_inline(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(run) if run.text.is_empty() => {}
            Node::Text(run) => match out.last_mut() {
                Some(Node::Text(previous)) if previous.same_marks(&run) => {
                    previous.text.push_str(&run.text);
                }
                _ => out.push(Node::Text(run)),
            },
            other => out.push(other),
        }
    }
    out
}

fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(index, _)| index)
}
