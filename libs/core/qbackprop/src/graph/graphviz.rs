use std::collections::BTreeMap;

use super::{Graph, _Rule};

// -----------------------------------------------------------------------------
// _GraphvizNode
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
enum _GraphvizNode {
    Leaf {
        label: Option<String>,
        value: String,
        grad: String,
    },
    Node {
        op: String,
        label: Option<String>,
        value: String,
        grad: String,
    },
}

impl _GraphvizNode {
    /// Attributes of the record: `[label|][op|]{value|grad}`.
    fn _annotations(&self) -> String {
        let (label, op, value, grad) = match self {
            _GraphvizNode::Leaf { label, value, grad } => (label, None, value, grad),
            _GraphvizNode::Node {
                op,
                label,
                value,
                grad,
            } => (label, Some(op), value, grad),
        };
        let head: String = label
            .iter()
            .chain(op)
            .map(|s| format!("{}|", _escape(s)))
            .collect();
        let style = match self {
            _GraphvizNode::Leaf { .. } => ", style=\"diagonals\"",
            _GraphvizNode::Node { .. } => "",
        };
        format!("label=\"{head}{{value={value}|grad={grad}}}\", shape=record{style}")
    }
}

/// Escape characters which have a meaning in record labels.
fn _escape(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '{' | '}' | '|' | '<' | '>') {
            res.push('\\');
        }
        res.push(c);
    }
    res
}

// -----------------------------------------------------------------------------
// GraphvizBuilder
// -----------------------------------------------------------------------------
/// Builder of a dot representation of the nodes reachable from a node.
///
/// Values and gradients are the ones stored when the builder is created.
/// Nodes are numbered in topological order, so the root comes last.
#[derive(Debug, Clone)]
pub struct GraphvizBuilder {
    nodes: Vec<_GraphvizNode>,
    edges: Vec<(usize, usize, Option<String>)>,
    name: String,
    graph_global_settings: BTreeMap<String, String>,
    node_global_settings: BTreeMap<String, String>,
}

impl GraphvizBuilder {
    pub(crate) fn _collect(graph: &Graph, root: usize) -> Self {
        let mut internal = graph.0.borrow_mut();
        let internal = &mut *internal;
        let precision = internal.config.graphviz_precision;
        let fmt = |v: f64| format!("{:.*}", precision, v);

        let order = internal.workspace._topo_order(&internal.tape, root);
        let position: BTreeMap<usize, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (idx, pos))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        let mut edges = Vec::new();
        for (pos, &idx) in order.iter().enumerate() {
            let cell = internal.tape._cell(idx);
            nodes.push(match cell.rule {
                _Rule::Leaf => _GraphvizNode::Leaf {
                    label: cell.label.clone(),
                    value: fmt(cell.value),
                    grad: fmt(cell.grad),
                },
                _ => _GraphvizNode::Node {
                    op: cell.op.to_string(),
                    label: cell.label.clone(),
                    value: fmt(cell.value),
                    grad: fmt(cell.grad),
                },
            });

            let binary = cell.rule._is_binary();
            for (i, parent) in cell.rule._parents().enumerate() {
                let label = binary.then(|| if i == 0 { "L" } else { "R" }.to_string());
                edges.push((position[&parent], pos, label));
            }
        }
        edges.sort();

        GraphvizBuilder {
            nodes,
            edges,
            name: "GradientGraph".to_string(),
            graph_global_settings: Default::default(),
            node_global_settings: Default::default(),
        }
    }

    /// Set the name of the graph.
    #[inline]
    pub fn with_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    /// Set a global setting for the graph.
    #[inline]
    pub fn with_graph_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.graph_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Set a global setting for the node.
    #[inline]
    pub fn with_node_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.node_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Generate a dot file.
    pub fn gen_dot(&self) -> String {
        let mut buf = format!("digraph {} {{\n", self.name);
        _write_settings(&mut buf, "graph", &self.graph_global_settings);
        _write_settings(&mut buf, "node", &self.node_global_settings);

        buf += "  // nodes\n";
        for (idx, node) in self.nodes.iter().enumerate() {
            buf += &format!("  {idx} [{}];\n", node._annotations());
        }
        buf += "\n";

        buf += "  // edges\n";
        for (src, dst, label) in &self.edges {
            buf += &match label {
                Some(label) => format!("  {src} -> {dst} [label=\"{label}\"];\n"),
                None => format!("  {src} -> {dst};\n"),
            };
        }

        buf += "}\n";
        buf
    }
}

fn _write_settings(buf: &mut String, kind: &str, settings: &BTreeMap<String, String>) {
    *buf += &format!("  {kind} [\n");
    for (key, value) in settings {
        *buf += &format!("    {key}={value};\n");
    }
    *buf += "  ];\n\n";
}
