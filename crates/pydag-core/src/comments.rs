//! Comment Collector
//!
//! Emits one standalone `Comment:<text>` node per comment token, in source
//! order. Comment nodes have no edges.

use tree_sitter::Node;

use crate::graph::{positional_id, GraphAccumulator, GraphNode};
use crate::parser::node_text;

/// Collect every comment beneath `root` into `graph`.
///
/// Returns the number of comments found.
pub fn collect_comments(
    root: &Node,
    source: &[u8],
    module: &str,
    graph: &mut GraphAccumulator,
) -> usize {
    let mut count = 0;
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        if node.kind() == "comment" {
            let text = node_text(&node, source).trim_end_matches('\r');
            let id = positional_id(module, "comment", &node);
            graph.push_node(GraphNode::comment(
                id,
                text,
                node.start_position().row + 1,
            ));
            count += 1;
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PythonParser;

    fn comments_of(source: &str) -> GraphAccumulator {
        let mut parser = PythonParser::new().unwrap();
        let tree = parser.parse(source).unwrap();
        let mut graph = GraphAccumulator::new();
        collect_comments(&tree.root_node(), source.as_bytes(), "m", &mut graph);
        graph
    }

    #[test]
    fn test_comments_in_source_order() {
        let source = "#!/usr/bin/env python\n# header\nx = 1  # trailing\n\ndef f():\n    # inside\n    pass\n";
        let graph = comments_of(source);
        let labels: Vec<_> = graph.labels().collect();
        assert_eq!(
            labels,
            vec![
                "Comment:#!/usr/bin/env python",
                "Comment:# header",
                "Comment:# trailing",
                "Comment:# inside",
            ]
        );
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes[2].id, "m::comment@3:7");
    }

    #[test]
    fn test_hash_inside_string_is_not_a_comment() {
        let graph = comments_of("s = '# not a comment'\n");
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_identical_comments_stay_distinct() {
        let graph = comments_of("# same\n# same\n");
        assert_eq!(graph.node_count(), 2);
        assert_ne!(graph.nodes[0].id, graph.nodes[1].id);
    }

    #[test]
    fn test_crlf_line_endings() {
        let graph = comments_of("# windows\r\nx = 1\r\n");
        assert_eq!(graph.nodes[0].label, "Comment:# windows");
    }
}
