//! Pure fragment helpers shared by transaction steps and scene operations.

use crate::model::node::{normalize_inline, Node, TextRun};

/// Splits a child sequence at a position relative to its content start.
///
/// Text runs are cut at the offset; containers are split recursively into two
/// copies. A cut exactly at a container's inner edge moves the whole container
/// to one side instead of leaving an empty shell behind.
pub fn split_fragment(nodes: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut pos = 0;
    for (index, node) in nodes.iter().enumerate() {
        let size = node.size();
        if offset <= pos {
            right.extend(nodes[index..].iter().cloned());
            break;
        }
        if offset >= pos + size {
            left.push(node.clone());
            pos += size;
            continue;
        }

        let inner = offset - pos;
        match node {
            Node::Text(run) => {
                let (head, tail) = run.split_at(inner);
                left.push(Node::Text(head));
                right.push(Node::Text(tail));
            }
            container => {
                let children = container.children().unwrap_or_default();
                let (head, tail) = split_fragment(children, inner - 1);
                if head.is_empty() {
                    right.push(container.clone());
                } else if tail.is_empty() {
                    left.push(container.clone());
                } else {
                    let textblock = container.node_type().is_textblock();
                    left.push(container.with_children(tidy(head, textblock)));
                    right.push(container.with_children(tidy(tail, textblock)));
                }
            }
        }
        right.extend(nodes[index + 1..].iter().cloned());
        break;
    }
    (left, right)
}

/// Applies `apply` to every text run overlapping `from..to`, cutting runs at
/// the range edges. Returns how many runs were touched.
pub(crate) fn map_text_range(
    nodes: &mut Vec<Node>,
    start: usize,
    from: usize,
    to: usize,
    textblock: bool,
    apply: &dyn Fn(&mut TextRun),
) -> usize {
    let mut touched = 0;
    let mut pos = start;
    let mut out = Vec::with_capacity(nodes.len());
    for node in std::mem::take(nodes) {
        let end = pos + node.size();
        if end <= from || pos >= to {
            out.push(node);
            pos = end;
            continue;
        }
        match node {
            Node::Text(run) => {
                let low = from.max(pos) - pos;
                let high = to.min(end) - pos;
                let (head, rest) = run.split_at(low);
                let (mut middle, tail) = rest.split_at(high - low);
                apply(&mut middle);
                touched += 1;
                for part in [head, middle, tail] {
                    if !part.text.is_empty() {
                        out.push(Node::Text(part));
                    }
                }
            }
            mut other => {
                let child_textblock = other.node_type().is_textblock();
                if let Some(children) = other.children_mut() {
                    touched +=
                        map_text_range(children, pos + 1, from, to, child_textblock, apply);
                }
                out.push(other);
            }
        }
        pos = end;
    }
    *nodes = tidy(out, textblock);
    touched
}

/// Plain text of a block sequence, one line per textblock.
pub fn plain_text(nodes: &[Node]) -> String {
    let mut lines = Vec::new();
    collect_lines(nodes, &mut lines);
    lines.join("\n")
}

fn collect_lines(nodes: &[Node], lines: &mut Vec<String>) {
    for node in nodes {
        if node.node_type().is_textblock() {
            lines.push(node.text_content());
        } else if let Some(children) = node.children() {
            collect_lines(children, lines);
        }
    }
}

fn tidy(nodes: Vec<Node>, textblock: bool) -> Vec<Node> {
    if textblock {
        normalize_inline(nodes)
    } else {
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::{plain_text, split_fragment};
    use crate::model::node::Node;

    #[test]
    fn split_inside_text_cuts_the_paragraph() {
        let nodes = vec![Node::paragraph("Hello world")];
        // offset 7 = paragraph open token + "Hello ".
        let (left, right) = split_fragment(&nodes, 7);
        assert_eq!(left, vec![Node::paragraph("Hello ")]);
        assert_eq!(right, vec![Node::paragraph("world")]);
    }

    #[test]
    fn split_on_block_boundary_keeps_nodes_whole() {
        let nodes = vec![Node::paragraph("one"), Node::paragraph("two")];
        let (left, right) = split_fragment(&nodes, 5);
        assert_eq!(left, vec![Node::paragraph("one")]);
        assert_eq!(right, vec![Node::paragraph("two")]);
    }

    #[test]
    fn split_at_container_inner_edges_moves_whole_container() {
        let nodes = vec![Node::paragraph("one"), Node::paragraph("two")];
        let (left, right) = split_fragment(&nodes, 6);
        assert_eq!(left, vec![Node::paragraph("one")]);
        assert_eq!(right, vec![Node::paragraph("two")]);

        let (left, right) = split_fragment(&nodes, 4);
        assert_eq!(left, vec![Node::paragraph("one")]);
        assert_eq!(right, vec![Node::paragraph("two")]);
    }

    #[test]
    fn split_at_extremes_leaves_one_side_empty() {
        let nodes = vec![Node::paragraph("one")];
        let (left, right) = split_fragment(&nodes, 0);
        assert!(left.is_empty());
        assert_eq!(right, nodes);
        let (left, right) = split_fragment(&nodes, 5);
        assert_eq!(left, nodes);
        assert!(right.is_empty());
    }

    #[test]
    fn plain_text_joins_textblocks_by_line() {
        let nodes = vec![
            Node::paragraph("one"),
            Node::blockquote(vec![Node::paragraph("two")]),
            Node::HorizontalRule,
        ];
        assert_eq!(plain_text(&nodes), "one\ntwo");
    }
}
