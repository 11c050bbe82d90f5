//! Persisted JSON shape of a document tree.
//!
//! # Responsibility
//! - Encode a [`Document`] as `{type, attrs, content | text, marks}` JSON.
//! - Decode persisted JSON back into typed nodes.
//!
//! # Invariants
//! - `decode(encode(doc)) == doc` for every valid document.
//! - Decoding enforces allowed-content contracts but tolerates the states that
//!   load repairs fix (empty scenes, duplicate ids, loose top-level blocks).
//! - Unknown node types decode as opaque atoms and re-encode unchanged.
//!
//! # See also
//! - `crate::tree::migration`

use super::Document;
use crate::model::entity::{EntityMarkAttrs, MentionAttrs};
use crate::model::node::{
    normalize_inline, Mark, Node, NodeType, OpaqueNode, SceneNode, SchemaViolation, TextRun,
};
use crate::model::scene::SceneAttrs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTITY_MARK: &str = "entity";
const DEFAULT_HEADING_LEVEL: u8 = 1;
const HEADING_LEVEL_KEY: &str = "level";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attrs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Vec<WireNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marks: Option<Vec<WireMark>>,
    /// Keys outside the node shape; only kept for opaque nodes.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMark {
    #[serde(rename = "type")]
    mark_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attrs: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HeadingAttrs {
    #[serde(default = "default_heading_level")]
    level: u8,
}

fn default_heading_level() -> u8 {
    DEFAULT_HEADING_LEVEL
}

/// Failure to decode a persisted document.
#[derive(Debug)]
pub enum WireError {
    /// Payload is not valid JSON or not node-shaped.
    Json(serde_json::Error),
    /// `type` names no known node.
    UnknownNodeType(String),
    /// Root node is not `doc`.
    UnknownRoot(String),
    /// Text node without a `text` field.
    MissingText,
    /// Attributes do not decode for the node type.
    InvalidAttrs {
        node_type: NodeType,
        source: serde_json::Error,
    },
    /// Content violates an allowed-content contract.
    Schema(SchemaViolation),
}

impl Display for WireError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid document json: {err}"),
            Self::UnknownNodeType(value) => write!(f, "unknown node type `{value}`"),
            Self::UnknownRoot(value) => write!(f, "root node must be `doc`, found `{value}`"),
            Self::MissingText => write!(f, "text node is missing `text`"),
            Self::InvalidAttrs { node_type, source } => {
                write!(f, "invalid `{node_type}` attributes: {source}")
            }
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WireError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidAttrs { source, .. } => Some(source),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WireError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<SchemaViolation> for WireError {
    fn from(value: SchemaViolation) -> Self {
        Self::Schema(value)
    }
}

impl Document {
    pub fn from_json_str(raw: &str) -> Result<Self, WireError> {
        let root: WireNode = serde_json::from_str(raw)?;
        decode_root(root)
    }

    pub fn from_json_value(value: Value) -> Result<Self, WireError> {
        let root: WireNode = serde_json::from_value(value)?;
        decode_root(root)
    }

    pub fn to_json_value(&self) -> Value {
        let content: Vec<Value> = self.content().iter().map(encode_node).collect();
        json!({ "type": NodeType::Doc.wire_name(), "content": content })
    }

    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }

    pub fn to_json_string_pretty(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string_pretty(&self.to_json_value())?)
    }
}

fn decode_root(root: WireNode) -> Result<Document, WireError> {
    if root.node_type != NodeType::Doc.wire_name() {
        return Err(WireError::UnknownRoot(root.node_type));
    }
    let content = decode_children(NodeType::Doc, root.content.unwrap_or_default())?;
    Ok(Document::from_nodes_unchecked(content))
}

fn decode_children(parent: NodeType, children: Vec<WireNode>) -> Result<Vec<Node>, WireError> {
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        let node = decode_node(child)?;
        if !parent.allows(node.node_type()) {
            return Err(SchemaViolation::DisallowedChild {
                parent,
                child: node.node_type(),
            }
            .into());
        }
        nodes.push(node);
    }
    if parent.is_textblock() {
        nodes = normalize_inline(nodes);
    }
    if nodes.is_empty() && parent == NodeType::Blockquote {
        return Err(SchemaViolation::EmptyContent(parent).into());
    }
    Ok(nodes)
}

fn decode_node(wire: WireNode) -> Result<Node, WireError> {
    let Some(node_type) = NodeType::from_wire_name(&wire.node_type) else {
        let node_type = wire.node_type.clone();
        let raw = serde_json::to_value(&wire)?;
        return Ok(Node::Opaque(OpaqueNode { node_type, raw }));
    };
    let children = wire.content.unwrap_or_default();

    let node = match node_type {
        NodeType::Doc | NodeType::Opaque => {
            return Err(WireError::UnknownNodeType(wire.node_type))
        }
        NodeType::Scene => {
            let attrs: SceneAttrs = decode_attrs(node_type, wire.attrs)?;
            Node::Scene(SceneNode::new(attrs, decode_children(node_type, children)?))
        }
        NodeType::Paragraph => Node::Paragraph {
            content: decode_children(node_type, children)?,
            attrs: wire.attrs,
        },
        NodeType::Heading => {
            let heading: HeadingAttrs = decode_attrs(node_type, wire.attrs.clone())?;
            Node::Heading {
                level: heading.level,
                content: decode_children(node_type, children)?,
                attrs: without_key(wire.attrs, HEADING_LEVEL_KEY),
            }
        }
        NodeType::Blockquote => Node::Blockquote {
            content: decode_children(node_type, children)?,
            attrs: wire.attrs,
        },
        NodeType::HorizontalRule => Node::HorizontalRule,
        NodeType::HardBreak => Node::HardBreak,
        NodeType::Mention => Node::Mention(decode_attrs::<MentionAttrs>(node_type, wire.attrs)?),
        NodeType::Text => {
            let text = wire.text.ok_or(WireError::MissingText)?;
            let marks = wire
                .marks
                .unwrap_or_default()
                .into_iter()
                .map(decode_mark)
                .collect::<Result<Vec<_>, _>>()?;
            Node::Text(TextRun { text, marks })
        }
    };
    Ok(node)
}

fn decode_attrs<T: DeserializeOwned>(
    node_type: NodeType,
    attrs: Option<Value>,
) -> Result<T, WireError> {
    let value = attrs.unwrap_or_else(|| json!({}));
    serde_json::from_value(value).map_err(|source| WireError::InvalidAttrs { node_type, source })
}

/// Drops `key` from an attrs object; `None` when nothing else remains.
fn without_key(attrs: Option<Value>, key: &str) -> Option<Value> {
    match attrs {
        Some(Value::Object(mut map)) => {
            map.remove(key);
            (!map.is_empty()).then_some(Value::Object(map))
        }
        _ => None,
    }
}

fn decode_mark(wire: WireMark) -> Result<Mark, WireError> {
    if wire.mark_type == ENTITY_MARK {
        let attrs: EntityMarkAttrs = decode_attrs(NodeType::Text, wire.attrs)?;
        return Ok(Mark::Entity(attrs));
    }
    Ok(Mark::Format {
        name: wire.mark_type,
        attrs: wire.attrs,
    })
}

fn encode_node(node: &Node) -> Value {
    let node_type = node.node_type().wire_name();
    match node {
        Node::Text(run) => {
            let mut value = json!({ "type": node_type, "text": run.text });
            if !run.marks.is_empty() {
                let marks: Vec<Value> = run.marks.iter().map(encode_mark).collect();
                value["marks"] = Value::from(marks);
            }
            value
        }
        Node::Mention(attrs) => json!({ "type": node_type, "attrs": attrs }),
        Node::HorizontalRule | Node::HardBreak => json!({ "type": node_type }),
        Node::Scene(scene) => with_content(
            json!({ "type": node_type, "attrs": scene.attrs }),
            &scene.content,
        ),
        Node::Heading {
            level,
            content,
            attrs,
        } => {
            let mut attrs = match attrs {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            attrs.insert(HEADING_LEVEL_KEY.to_string(), Value::from(*level));
            with_content(json!({ "type": node_type, "attrs": attrs }), content)
        }
        Node::Paragraph { content, attrs } | Node::Blockquote { content, attrs } => {
            let mut value = json!({ "type": node_type });
            if let Some(attrs) = attrs {
                value["attrs"] = attrs.clone();
            }
            with_content(value, content)
        }
        Node::Opaque(opaque) => opaque.raw.clone(),
    }
}

fn with_content(mut value: Value, content: &[Node]) -> Value {
    if !content.is_empty() {
        let children: Vec<Value> = content.iter().map(encode_node).collect();
        value["content"] = Value::from(children);
    }
    value
}

fn encode_mark(mark: &Mark) -> Value {
    match mark {
        Mark::Entity(attrs) => json!({ "type": ENTITY_MARK, "attrs": attrs }),
        Mark::Format { name, attrs } => match attrs {
            Some(attrs) => json!({ "type": name, "attrs": attrs }),
            None => json!({ "type": name }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::WireError;
    use crate::model::node::{Node, NodeType, SchemaViolation};
    use crate::tree::Document;
    use serde_json::json;

    #[test]
    fn decodes_scene_with_mentions_and_marks() {
        let value = json!({
            "type": "doc",
            "content": [{
                "type": "scene",
                "attrs": {
                    "id": "7f1d1c2e-6b0a-4e55-9a8c-2d8e43f0a001",
                    "slug": "Arrival",
                    "characters": ["c1"],
                    "status": "review"
                },
                "content": [{
                    "type": "paragraph",
                    "content": [
                        { "type": "text", "text": "Hi " },
                        { "type": "mention",
                          "attrs": { "id": "c1", "label": "Ann", "entityType": "character" } },
                        { "type": "text", "text": "!", "marks": [{ "type": "bold" }] }
                    ]
                }]
            }]
        });
        let doc = Document::from_json_value(value).expect("document should decode");
        assert_eq!(doc.scene_count(), 1);
        assert_eq!(doc.text_content(), "Hi Ann!");
        let scene = doc.content()[0].as_scene().expect("scene");
        assert_eq!(scene.attrs.title, "Arrival");
        assert!(scene.attrs.participants.contains("c1"));
    }

    #[test]
    fn round_trip_preserves_opaque_formatting() {
        let value = json!({
            "type": "doc",
            "content": [{
                "type": "scene",
                "attrs": {
                    "id": "7f1d1c2e-6b0a-4e55-9a8c-2d8e43f0a002",
                    "slug": "", "location": "", "locationId": null, "status": "draft",
                    "collapsed": false, "characters": [], "goal": "", "event": "",
                    "change": "", "metaExpanded": false
                },
                "content": [
                    { "type": "heading", "attrs": { "level": 2 },
                      "content": [{ "type": "text", "text": "Title",
                                    "marks": [{ "type": "link", "attrs": { "href": "x" } }] }] },
                    { "type": "paragraph" },
                    { "type": "blockquote", "content": [{ "type": "horizontalRule" }] }
                ]
            }]
        });
        let doc = Document::from_json_value(value.clone()).expect("document should decode");
        assert_eq!(doc.to_json_value(), value);
    }

    #[test]
    fn unknown_types_are_carried_opaquely() {
        let value = json!({
            "type": "doc",
            "content": [{
                "type": "table",
                "attrs": { "border": 1 },
                "content": [{ "type": "tableRow", "content": [] }],
                "extension": "kept"
            }]
        });
        let doc = Document::from_json_value(value.clone()).expect("unknown types decode");
        assert!(matches!(
            doc.content()[0],
            Node::Opaque(ref opaque) if opaque.node_type == "table"
        ));
        assert_eq!(doc.content()[0].size(), 1);
        assert_eq!(doc.to_json_value(), value);
    }

    #[test]
    fn rejects_nested_roots_and_misplaced_nodes() {
        let err = Document::from_json_value(json!({
            "type": "doc",
            "content": [{ "type": "doc" }]
        }))
        .expect_err("nested doc must fail");
        assert!(matches!(err, WireError::UnknownNodeType(name) if name == "doc"));

        let err = Document::from_json_value(json!({
            "type": "doc",
            "content": [{ "type": "text", "text": "loose" }]
        }))
        .expect_err("root does not accept text");
        assert!(matches!(
            err,
            WireError::Schema(SchemaViolation::DisallowedChild {
                parent: NodeType::Doc,
                child: NodeType::Text
            })
        ));
    }

    #[test]
    fn tolerates_legacy_loose_blocks() {
        let doc = Document::from_json_str(
            r#"{"type":"doc","content":[
                {"type":"paragraph","content":[{"type":"text","text":"old"}]}
            ]}"#,
        )
        .expect("legacy document should decode");
        assert!(!doc.has_scenes());
        assert_eq!(doc.content(), &[Node::paragraph("old")]);
    }
}
