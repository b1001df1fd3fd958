use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use qbackprop::{Graph, GraphConfig, Node};

use super::Cmd;

// -----------------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------------
/// Node to differentiate.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[clap(rename_all = "snake_case")]
pub enum Output {
    /// d = (a + b) * c
    D,
    /// exp(d)
    Exp,
    /// sigmoid(d)
    Sigmoid,
    /// tanh(a - b)
    Tanh,
    /// sin(c / a)
    Sin,
}

// -----------------------------------------------------------------------------
// Args
// -----------------------------------------------------------------------------
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Value of the leaf a
    #[clap(allow_negative_numbers = true)]
    pub a: f64,

    /// Value of the leaf b
    #[clap(allow_negative_numbers = true)]
    pub b: f64,

    /// Value of the leaf c
    #[clap(allow_negative_numbers = true)]
    pub c: f64,

    /// Node to differentiate
    #[clap(short = 'o', long = "output", value_enum, default_value = "d")]
    pub output: Output,

    /// Print the graph in dot format instead of the table
    #[clap(long = "dot")]
    pub dot: bool,

    /// JSON file of the graph configuration
    #[clap(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl Cmd for Args {
    fn run(&self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => load_config(path)?,
            None => GraphConfig::default(),
        };
        log::info!("{:?}", config);

        let graph = Graph::with_config(config);
        let exprs = Exprs::build(&graph, self.a, self.b, self.c);
        let out = exprs.select(self.output);
        out.backward()?;

        if self.dot {
            print!("{}", out.graphviz().gen_dot());
            return Ok(());
        }

        println!("{:<12} {:>14} {:>14}", "node", "value", "grad");
        for node in [&exprs.a, &exprs.b, &exprs.c, out] {
            println!(
                "{:<12} {:>14.6} {:>14.6}",
                node.label().unwrap_or_default(),
                node.value(),
                node.grad()
            );
        }
        Ok(())
    }
}

fn load_config(path: &Path) -> anyhow::Result<GraphConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file at {:?}", path))
}

// -----------------------------------------------------------------------------
// Exprs
// -----------------------------------------------------------------------------
/// Sample expressions sharing the leaves a, b and c.
struct Exprs {
    a: Node,
    b: Node,
    c: Node,
    d: Node,
    exp: Node,
    sigmoid: Node,
    tanh: Node,
    sin: Node,
}

impl Exprs {
    fn build(graph: &Graph, a: f64, b: f64, c: f64) -> Self {
        let a = graph.leaf_labeled("a", a);
        let b = graph.leaf_labeled("b", b);
        let c = graph.leaf_labeled("c", c);

        let d = (&a + &b) * &c;
        d.set_label("d");
        let exp = d.exp();
        exp.set_label("exp(d)");
        let sigmoid = d.sigmoid();
        sigmoid.set_label("sigmoid(d)");
        let tanh = (&a - &b).tanh();
        tanh.set_label("tanh(a-b)");
        let sin = (&c / &a).sin();
        sin.set_label("sin(c/a)");

        Self {
            a,
            b,
            c,
            d,
            exp,
            sigmoid,
            tanh,
            sin,
        }
    }

    fn select(&self, output: Output) -> &Node {
        match output {
            Output::D => &self.d,
            Output::Exp => &self.exp,
            Output::Sigmoid => &self.sigmoid,
            Output::Tanh => &self.tanh,
            Output::Sin => &self.sin,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::*;

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    #[rstest]
    #[case(Output::D, 9.0, [3.0, 3.0, 3.0])]
    #[case(Output::Exp, 9f64.exp(), [3.0 * 9f64.exp(), 3.0 * 9f64.exp(), 3.0 * 9f64.exp()])]
    #[case(
        Output::Sigmoid,
        sigmoid(9.0),
        [3.0 * sigmoid(9.0) * (1.0 - sigmoid(9.0)); 3]
    )]
    #[case(
        Output::Tanh,
        (-1f64).tanh(),
        [1.0 - (-1f64).tanh().powi(2), (-1f64).tanh().powi(2) - 1.0, 0.0]
    )]
    #[case(
        Output::Sin,
        3f64.sin(),
        [-3.0 * 3f64.cos(), 0.0, 3f64.cos()]
    )]
    fn test_exprs(#[case] output: Output, #[case] value: f64, #[case] grads: [f64; 3]) {
        let graph = Graph::new();
        let exprs = Exprs::build(&graph, 1.0, 2.0, 3.0);

        let out = exprs.select(output);
        out.backward().unwrap();

        assert_abs_diff_eq!(out.value(), value, epsilon = 1e-9);
        assert_abs_diff_eq!(exprs.a.grad(), grads[0], epsilon = 1e-9);
        assert_abs_diff_eq!(exprs.b.grad(), grads[1], epsilon = 1e-9);
        assert_abs_diff_eq!(exprs.c.grad(), grads[2], epsilon = 1e-9);
    }

    #[test]
    fn test_labels() {
        let graph = Graph::new();
        let exprs = Exprs::build(&graph, 1.0, 2.0, 3.0);

        assert_eq!(exprs.a.label().as_deref(), Some("a"));
        assert_eq!(exprs.select(Output::Sin).label().as_deref(), Some("sin(c/a)"));
    }

    #[test]
    fn test_load_config_err_missing_file() {
        let res = load_config(Path::new("this/file/does/not/exist.json"));

        assert!(res.is_err());
    }
}
