//! Transactions: ordered batches of primitive edits applied all-or-nothing.
//!
//! # Responsibility
//! - Define the primitive steps (insert, delete, replace, set attrs, marks).
//! - Apply a batch to a copy of the tree and return the new tree.
//!
//! # Invariants
//! - Each step sees the tree produced by the previous step.
//! - Any failing step discards the whole batch; the input tree is untouched.
//! - Replaced ranges must start and end in the same parent container.

use super::fragment::map_text_range;
use super::position::container_mut;
use super::{Document, PositionError, TreeError};
use crate::model::entity::MentionAttrs;
use crate::model::node::{check_node, normalize_inline, Mark, Node, SchemaViolation, TextRun};
use crate::model::scene::SceneAttrs;
use log::debug;

/// Attribute payload for [`Step::SetAttrs`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAttrs {
    Scene(SceneAttrs),
    Mention(MentionAttrs),
    Heading { level: u8 },
}

/// One primitive edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Inserts nodes at a position.
    Insert { pos: usize, nodes: Vec<Node> },
    /// Removes everything between two positions.
    Delete { from: usize, to: usize },
    /// Removes a range and inserts nodes in its place.
    Replace {
        from: usize,
        to: usize,
        nodes: Vec<Node>,
    },
    /// Replaces the attributes of the node starting at `pos`.
    SetAttrs { pos: usize, attrs: NodeAttrs },
    /// Adds a mark to every text run in the range.
    AddMark { from: usize, to: usize, mark: Mark },
    /// Removes marks with the same target from every text run in the range.
    RemoveMark { from: usize, to: usize, mark: Mark },
}

impl Step {
    fn apply(&self, doc: &mut Document) -> Result<(), TreeError> {
        match self {
            Self::Insert { pos, nodes } => replace(doc, *pos, *pos, nodes.clone()),
            Self::Delete { from, to } => replace(doc, *from, *to, Vec::new()),
            Self::Replace { from, to, nodes } => replace(doc, *from, *to, nodes.clone()),
            Self::SetAttrs { pos, attrs } => set_attrs(doc, *pos, attrs.clone()),
            Self::AddMark { from, to, mark } => {
                map_marks(doc, *from, *to, &|run| run.add_mark(mark))
            }
            Self::RemoveMark { from, to, mark } => {
                map_marks(doc, *from, *to, &|run| run.remove_mark(mark))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Delete { .. } => "delete",
            Self::Replace { .. } => "replace",
            Self::SetAttrs { .. } => "set_attrs",
            Self::AddMark { .. } => "add_mark",
            Self::RemoveMark { .. } => "remove_mark",
        }
    }
}

/// Ordered batch of steps with history metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    label: &'static str,
    steps: Vec<Step>,
    add_to_history: bool,
}

impl Transaction {
    /// Starts an empty batch; `label` names the originating operation in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            steps: Vec::new(),
            add_to_history: true,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn insert(self, pos: usize, nodes: Vec<Node>) -> Self {
        self.step(Step::Insert { pos, nodes })
    }

    pub fn delete(self, from: usize, to: usize) -> Self {
        self.step(Step::Delete { from, to })
    }

    pub fn replace(self, from: usize, to: usize, nodes: Vec<Node>) -> Self {
        self.step(Step::Replace { from, to, nodes })
    }

    pub fn set_attrs(self, pos: usize, attrs: NodeAttrs) -> Self {
        self.step(Step::SetAttrs { pos, attrs })
    }

    pub fn add_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::RemoveMark { from, to, mark })
    }

    /// Marks the batch as view-state only; undo history skips it.
    pub fn without_history(mut self) -> Self {
        self.add_to_history = false;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn adds_to_history(&self) -> bool {
        self.add_to_history
    }
}

impl Document {
    /// Applies every step to a copy of this tree.
    ///
    /// Returns the new tree, or the first step error with `self` unchanged.
    pub fn apply(&self, tx: &Transaction) -> Result<Document, TreeError> {
        let mut next = self.clone();
        for (index, step) in tx.steps().iter().enumerate() {
            if let Err(err) = step.apply(&mut next) {
                debug!(
                    "event=tx_apply module=tree status=error label={} step_index={} step={} error={}",
                    tx.label(),
                    index,
                    step.name(),
                    err
                );
                return Err(err);
            }
        }
        Ok(next)
    }
}

fn replace(doc: &mut Document, from: usize, to: usize, nodes: Vec<Node>) -> Result<(), TreeError> {
    if from > to {
        return Err(PositionError::InvertedRange { from, to }.into());
    }
    let start = doc.resolve(from)?;
    let end = doc.resolve(to)?;
    if !start.same_parent(&end) {
        return Err(PositionError::CrossesNodeBoundary { from, to }.into());
    }

    let (parent, children) = container_mut(doc.content_mut(), &start.path)?;
    for node in &nodes {
        check_node(parent, node)?;
    }

    let mut next: Vec<Node> = children[..start.index].to_vec();
    if start.text_offset > 0 {
        if let Some(Node::Text(run)) = children.get(start.index) {
            next.push(Node::Text(run.split_at(start.text_offset).0));
        }
    }
    next.extend(nodes);
    if end.text_offset > 0 {
        if let Some(Node::Text(run)) = children.get(end.index) {
            next.push(Node::Text(run.split_at(end.text_offset).1));
        }
        next.extend(children[end.index + 1..].iter().cloned());
    } else {
        next.extend(children[end.index..].iter().cloned());
    }

    let next = if parent.is_textblock() {
        normalize_inline(next)
    } else {
        next
    };
    if next.is_empty() && parent.requires_content() {
        return Err(SchemaViolation::EmptyContent(parent).into());
    }
    *children = next;
    Ok(())
}

fn set_attrs(doc: &mut Document, pos: usize, attrs: NodeAttrs) -> Result<(), TreeError> {
    let resolved = doc.resolve(pos)?;
    if !resolved.at_boundary() {
        return Err(PositionError::InsideText { pos }.into());
    }
    let (_, children) = container_mut(doc.content_mut(), &resolved.path)?;
    let node = children
        .get_mut(resolved.index)
        .ok_or(PositionError::NoNodeAt { pos })?;

    match (node, attrs) {
        (Node::Scene(scene), NodeAttrs::Scene(attrs)) => {
            if scene.attrs.id != attrs.id {
                return Err(SchemaViolation::SceneIdChanged {
                    from: scene.attrs.id,
                    to: attrs.id,
                }
                .into());
            }
            scene.attrs = attrs;
        }
        (Node::Mention(current), NodeAttrs::Mention(attrs)) => *current = attrs,
        (Node::Heading { level, .. }, NodeAttrs::Heading { level: next }) => *level = next,
        (node, _) => {
            return Err(SchemaViolation::AttrsMismatch {
                target: node.node_type(),
            }
            .into())
        }
    }
    Ok(())
}

fn map_marks(
    doc: &mut Document,
    from: usize,
    to: usize,
    apply: &dyn Fn(&mut TextRun),
) -> Result<(), TreeError> {
    if from > to {
        return Err(PositionError::InvertedRange { from, to }.into());
    }
    let size = doc.size();
    if to > size {
        return Err(PositionError::OutOfRange { pos: to, size }.into());
    }
    let touched = map_text_range(doc.content_mut(), 0, from, to, false, apply);
    if touched == 0 {
        return Err(SchemaViolation::MarkOutsideText.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{NodeAttrs, Transaction};
    use crate::model::entity::{EntityKind, EntityMarkAttrs};
    use crate::model::node::{Mark, Node, NodeType, SceneNode, SchemaViolation};
    use crate::model::scene::SceneAttrs;
    use crate::tree::{Document, PositionError, TreeError};

    fn doc_with(text: &str) -> Document {
        Document::from_nodes(vec![Node::Scene(SceneNode::new(
            SceneAttrs::new(),
            vec![Node::paragraph(text)],
        ))])
        .expect("valid doc")
    }

    fn mark(id: &str) -> Mark {
        Mark::Entity(EntityMarkAttrs {
            entity_id: id.to_string(),
            kind: EntityKind::Character,
        })
    }

    #[test]
    fn insert_text_inside_paragraph_merges_runs() {
        let doc = doc_with("Hello world");
        let next = doc
            .apply(&Transaction::new("test").insert(8, vec![Node::text("big ")]))
            .expect("insert should apply");
        assert_eq!(next.text_content(), "Hello big world");
        let paragraph = next.content()[0].children().expect("scene children")[0].clone();
        assert_eq!(paragraph.children().map(<[Node]>::len), Some(1));
    }

    #[test]
    fn failing_step_leaves_source_untouched() {
        let doc = doc_with("Hello");
        let tx = Transaction::new("test")
            .insert(3, vec![Node::text("ok ")])
            .insert(1, vec![Node::text("loose")]);
        let err = doc.apply(&tx).expect_err("inline directly in scene must fail");
        assert_eq!(
            err,
            TreeError::Schema(SchemaViolation::DisallowedChild {
                parent: NodeType::Scene,
                child: NodeType::Text
            })
        );
        assert_eq!(doc.text_content(), "Hello");
    }

    #[test]
    fn delete_across_parents_is_rejected() {
        let doc = Document::from_nodes(vec![Node::Scene(SceneNode::new(
            SceneAttrs::new(),
            vec![Node::paragraph("one"), Node::paragraph("two")],
        ))])
        .expect("valid doc");
        let err = doc
            .apply(&Transaction::new("test").delete(3, 8))
            .expect_err("cross-parent delete must fail");
        assert_eq!(
            err,
            TreeError::Position(PositionError::CrossesNodeBoundary { from: 3, to: 8 })
        );
    }

    #[test]
    fn deleting_all_scene_content_is_rejected() {
        let doc = doc_with("abc");
        let err = doc
            .apply(&Transaction::new("test").delete(1, 6))
            .expect_err("scene content must stay non-empty");
        assert_eq!(
            err,
            TreeError::Schema(SchemaViolation::EmptyContent(NodeType::Scene))
        );
    }

    #[test]
    fn set_attrs_refuses_id_change_and_type_mismatch() {
        let doc = doc_with("abc");
        let err = doc
            .apply(&Transaction::new("test").set_attrs(0, NodeAttrs::Scene(SceneAttrs::new())))
            .expect_err("scene id must be immutable");
        assert!(matches!(
            err,
            TreeError::Schema(SchemaViolation::SceneIdChanged { .. })
        ));

        let err = doc
            .apply(&Transaction::new("test").set_attrs(1, NodeAttrs::Heading { level: 2 }))
            .expect_err("paragraph has no heading attrs");
        assert_eq!(
            err,
            TreeError::Schema(SchemaViolation::AttrsMismatch {
                target: NodeType::Paragraph
            })
        );
    }

    #[test]
    fn marks_split_runs_and_rejoin_on_removal() {
        let doc = doc_with("Hello world");
        let marked = doc
            .apply(&Transaction::new("test").add_mark(8, 13, mark("c1")))
            .expect("mark should apply");
        let paragraph = &marked.content()[0].children().expect("scene children")[0];
        assert_eq!(paragraph.children().map(<[Node]>::len), Some(2));

        let cleared = marked
            .apply(&Transaction::new("test").remove_mark(2, 13, mark("c1")))
            .expect("mark removal should apply");
        assert_eq!(cleared, doc);
    }

    #[test]
    fn marks_need_text_in_range() {
        let doc = doc_with("");
        let err = doc
            .apply(&Transaction::new("test").add_mark(0, doc.size(), mark("c1")))
            .expect_err("no text to decorate");
        assert_eq!(err, TreeError::Schema(SchemaViolation::MarkOutsideText));
    }
}
