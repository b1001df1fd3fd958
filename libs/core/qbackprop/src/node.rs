use std::fmt::{Debug, Display};

use crate::{graph::_Rule, Error, Graph, GraphvizBuilder, Operation};

// -----------------------------------------------------------------------------
// Node
// -----------------------------------------------------------------------------
/// Handle to a scalar value recorded in a [Graph].
///
/// A node is either a leaf created by [Graph::leaf] or the result of an
/// operation. Its value and operands never change after creation; only the
/// gradient is updated by [Node::backward] and the resets.
///
/// Cloning a node is cheap and the clone refers to the same value and gradient.
///
/// Operators (`+`, `-`, `*`, `/` and unary `-`) accept nodes and `f64` on
/// either side. They panic when nodes of different graphs are combined;
/// use [Node::try_add] and its siblings to get an error instead.
pub struct Node {
    pub(crate) graph: Graph,
    pub(crate) index: usize,
}

impl Clone for Node {
    #[inline]
    fn clone(&self) -> Self {
        self._share(self.index)
    }
}

impl Drop for Node {
    #[inline]
    fn drop(&mut self) {
        self.graph.0.borrow_mut().tape._decl_refcnt(self.index);
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let internal = self.graph.0.borrow();
        let cell = internal.tape._cell(self.index);
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("value", &cell.value)
            .field("grad", &cell.grad)
            .field("operation", &cell.op)
            .field("label", &cell.label)
            .finish()
    }
}

impl Display for Node {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node(value={})", self.value())
    }
}

//
// ctor
//
impl Node {
    /// Wrap a cell whose reference for this handle is already counted.
    #[inline]
    pub(crate) fn _new(graph: Graph, index: usize) -> Self {
        Self { graph, index }
    }

    /// New handle to a live cell of the same graph.
    #[inline]
    fn _share(&self, index: usize) -> Self {
        self.graph.0.borrow_mut().tape._incl_refcnt(index);
        Self::_new(self.graph.clone(), index)
    }

    #[inline]
    fn _derive(&self, value: f64, rule: _Rule, op: Operation) -> Self {
        let index = self.graph.0.borrow_mut().tape._reg_node(value, rule, op);
        Self::_new(self.graph.clone(), index)
    }
}

//
// accessors
//
impl Node {
    #[inline]
    pub fn value(&self) -> f64 {
        self.graph.0.borrow().tape._cell(self.index).value
    }

    /// Accumulated gradient of the last differentiated node with respect to this node.
    #[inline]
    pub fn grad(&self) -> f64 {
        self.graph.0.borrow().tape._cell(self.index).grad
    }

    #[inline]
    pub fn operation(&self) -> Operation {
        self.graph.0.borrow().tape._cell(self.index).op
    }

    #[inline]
    pub fn label(&self) -> Option<String> {
        self.graph.0.borrow().tape._cell(self.index).label.clone()
    }

    #[inline]
    pub fn set_label(&self, label: impl Into<String>) {
        self.graph.0.borrow_mut().tape._cell_mut(self.index).label = Some(label.into());
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Operands of this node in the order they were given.
    ///
    /// Literal operands show up as leaves.
    pub fn parents(&self) -> Vec<Node> {
        let parents: Vec<_> = self
            .graph
            .0
            .borrow()
            .tape
            ._cell(self.index)
            .rule
            ._parents()
            .collect();
        parents.into_iter().map(|idx| self._share(idx)).collect()
    }

    /// Check that two nodes refer to the same value of the same graph.
    #[inline]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Graph::ptr_eq(&lhs.graph, &rhs.graph) && lhs.index == rhs.index
    }
}

//
// differentiation
//
impl Node {
    /// Propagate gradient from this node to every node it depends on.
    ///
    /// The gradient of this node is set to one and gradients of its ancestors
    /// are accumulated. Calling this twice without a reset doubles the
    /// gradients, which is reported as [Error::AlreadyDifferentiated]
    /// when [crate::GraphConfig::strict_backward] is enabled.
    pub fn backward(&self) -> Result<(), Error> {
        let mut internal = self.graph.0.borrow_mut();
        let internal = &mut *internal;
        if internal.config.strict_backward && internal.differentiated.is_some() {
            return Err(Error::AlreadyDifferentiated);
        }
        internal.workspace._back_prop(&mut internal.tape, self.index);
        internal.differentiated = Some(self.index);
        Ok(())
    }

    /// Set gradients of this node and of every node it depends on to zero.
    ///
    /// In strict mode, backward is allowed again only if this node is or depends
    /// on the root of the last backward pass, so that no stale gradient is left.
    pub fn reset_gradients(&self) {
        let mut internal = self.graph.0.borrow_mut();
        let internal = &mut *internal;
        let order = internal.workspace._topo_order(&internal.tape, self.index);
        for &idx in order {
            internal.tape._cell_mut(idx).grad = 0.0;
        }
        if let Some(root) = internal.differentiated {
            if order.contains(&root) {
                internal.differentiated = None;
            }
        }
        log::debug!("Reset gradients of {} nodes", order.len());
    }

    /// This node and every node it depends on, operands before their results.
    ///
    /// Each node appears once and this node comes last.
    pub fn topological_order(&self) -> Vec<Node> {
        let order = {
            let mut internal = self.graph.0.borrow_mut();
            let internal = &mut *internal;
            internal
                .workspace
                ._topo_order(&internal.tape, self.index)
                .to_vec()
        };
        order.into_iter().map(|idx| self._share(idx)).collect()
    }

    /// Dot representation of this node and every node it depends on.
    #[inline]
    pub fn graphviz(&self) -> GraphvizBuilder {
        GraphvizBuilder::_collect(&self.graph, self.index)
    }
}

//
// operations
//
impl Node {
    #[inline]
    fn _add(&self, rhs: &Node, op: Operation) -> Node {
        let value = self.value() + rhs.value();
        self._derive(
            value,
            _Rule::Add {
                lhs: self.index,
                rhs: rhs.index,
            },
            op,
        )
    }

    #[inline]
    fn _mul(&self, rhs: &Node, op: Operation) -> Node {
        let value = self.value() * rhs.value();
        self._derive(
            value,
            _Rule::Mul {
                lhs: self.index,
                rhs: rhs.index,
            },
            op,
        )
    }

    /// `self * (-1)`
    #[inline]
    fn _negate(&self) -> Node {
        let minus_one = self.graph.leaf(-1.0);
        self._mul(&minus_one, Operation::Neg)
    }

    #[inline]
    pub fn try_add(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        let rhs = rhs.into()._into_node(&self.graph, "add")?;
        Ok(self._add(&rhs, Operation::Add))
    }

    #[inline]
    pub fn try_mul(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        let rhs = rhs.into()._into_node(&self.graph, "mul")?;
        Ok(self._mul(&rhs, Operation::Mul))
    }

    /// `self + (-rhs)`
    #[inline]
    pub fn try_sub(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        let rhs = rhs.into()._into_node(&self.graph, "sub")?;
        Ok(self._add(&rhs._negate(), Operation::Sub))
    }

    /// `self * rhs^(-1)`
    ///
    /// Division by zero is not checked and gives infinities or NaN.
    #[inline]
    pub fn try_div(&self, rhs: impl Into<Operand>) -> Result<Node, Error> {
        let rhs = rhs.into()._into_node(&self.graph, "div")?;
        Ok(self._mul(&rhs.powf(-1.0), Operation::Div))
    }

    /// Power with a constant exponent.
    ///
    /// Only literals are accepted as the exponent; a node gives [Error::InvalidOperand].
    #[inline]
    pub fn pow(&self, exp: impl Into<Operand>) -> Result<Node, Error> {
        match exp.into() {
            Operand::Literal(exp) => Ok(self.powf(exp)),
            Operand::Node(_) => Err(Error::InvalidOperand("pow")),
        }
    }

    #[inline]
    pub fn powf(&self, exp: f64) -> Node {
        let value = self.value().powf(exp);
        self._derive(
            value,
            _Rule::Pow {
                arg: self.index,
                exp,
            },
            Operation::Pow(exp),
        )
    }

    #[inline]
    pub fn exp(&self) -> Node {
        let value = self.value().exp();
        self._derive(value, _Rule::Exp { arg: self.index }, Operation::Exp)
    }

    #[inline]
    pub fn tanh(&self) -> Node {
        let value = self.value().tanh();
        self._derive(value, _Rule::Tanh { arg: self.index }, Operation::Tanh)
    }

    #[inline]
    pub fn sin(&self) -> Node {
        let value = self.value().sin();
        self._derive(value, _Rule::Sin { arg: self.index }, Operation::Sin)
    }

    #[inline]
    pub fn cos(&self) -> Node {
        let value = self.value().cos();
        self._derive(value, _Rule::Cos { arg: self.index }, Operation::Cos)
    }

    /// `1 / (1 + e^(-x))`
    #[inline]
    pub fn sigmoid(&self) -> Node {
        let value = 1.0 / (1.0 + (-self.value()).exp());
        self._derive(value, _Rule::Sigmoid { arg: self.index }, Operation::Sigmoid)
    }
}

// -----------------------------------------------------------------------------
// Operand
// -----------------------------------------------------------------------------
/// Right hand side of a binary operation.
#[derive(Debug, Clone)]
pub enum Operand {
    Node(Node),
    Literal(f64),
}

impl From<f64> for Operand {
    #[inline]
    fn from(value: f64) -> Self {
        Operand::Literal(value)
    }
}

impl From<Node> for Operand {
    #[inline]
    fn from(node: Node) -> Self {
        Operand::Node(node)
    }
}

impl From<&Node> for Operand {
    #[inline]
    fn from(node: &Node) -> Self {
        Operand::Node(node.clone())
    }
}

impl Operand {
    /// Literals become fresh leaves of `graph`.
    #[inline]
    fn _into_node(self, graph: &Graph, op: &'static str) -> Result<Node, Error> {
        match self {
            Operand::Node(node) if Graph::ptr_eq(&node.graph, graph) => Ok(node),
            Operand::Node(_) => Err(Error::DifferentGraphs(op)),
            Operand::Literal(value) => Ok(graph.leaf(value)),
        }
    }
}

// -----------------------------------------------------------------------------
// operators
// -----------------------------------------------------------------------------
macro_rules! _define_arithmetic_binary {
    ($tr:ident, $fn:ident, $try_fn:ident, $ass_tr:ident, $ass_fn:ident) => {
        impl std::ops::$tr<&Node> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                self.$try_fn(rhs).unwrap_or_else(|e| panic!("{}", e))
            }
        }
        impl std::ops::$tr<Node> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(self, &rhs)
            }
        }
        impl std::ops::$tr<&Node> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                std::ops::$tr::$fn(&self, rhs)
            }
        }
        impl std::ops::$tr<Node> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(&self, &rhs)
            }
        }
        impl std::ops::$tr<f64> for &Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                self.$try_fn(rhs).unwrap_or_else(|e| panic!("{}", e))
            }
        }
        impl std::ops::$tr<f64> for Node {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                std::ops::$tr::$fn(&self, rhs)
            }
        }
        impl std::ops::$ass_tr<&Node> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: &Node) {
                *self = std::ops::$tr::$fn(&*self, rhs);
            }
        }
        impl std::ops::$ass_tr<Node> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: Node) {
                *self = std::ops::$tr::$fn(&*self, &rhs);
            }
        }
        impl std::ops::$ass_tr<f64> for Node {
            #[inline]
            fn $ass_fn(&mut self, rhs: f64) {
                *self = std::ops::$tr::$fn(&*self, rhs);
            }
        }
    };
}

_define_arithmetic_binary!(Add, add, try_add, AddAssign, add_assign);
_define_arithmetic_binary!(Sub, sub, try_sub, SubAssign, sub_assign);
_define_arithmetic_binary!(Mul, mul, try_mul, MulAssign, mul_assign);
_define_arithmetic_binary!(Div, div, try_div, DivAssign, div_assign);

// `f64 op node`
macro_rules! _define_reflected_binary {
    // the node goes to the left
    (commutative, $tr:ident, $fn:ident) => {
        impl std::ops::$tr<&Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                std::ops::$tr::$fn(rhs, self)
            }
        }
        impl std::ops::$tr<Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(&rhs, self)
            }
        }
    };
    // the literal becomes a leaf on the left
    (ordered, $tr:ident, $fn:ident) => {
        impl std::ops::$tr<&Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: &Node) -> Self::Output {
                std::ops::$tr::$fn(rhs.graph.leaf(self), rhs)
            }
        }
        impl std::ops::$tr<Node> for f64 {
            type Output = Node;

            #[inline]
            fn $fn(self, rhs: Node) -> Self::Output {
                std::ops::$tr::$fn(rhs.graph.leaf(self), &rhs)
            }
        }
    };
}

_define_reflected_binary!(commutative, Add, add);
_define_reflected_binary!(commutative, Mul, mul);
_define_reflected_binary!(ordered, Sub, sub);
_define_reflected_binary!(ordered, Div, div);

impl std::ops::Neg for &Node {
    type Output = Node;

    #[inline]
    fn neg(self) -> Self::Output {
        self._negate()
    }
}

impl std::ops::Neg for Node {
    type Output = Node;

    #[inline]
    fn neg(self) -> Self::Output {
        self._negate()
    }
}
