use crate::Operation;

// -----------------------------------------------------------------------------
// _Rule
// -----------------------------------------------------------------------------
/// Local derivative rule of a node.
///
/// Each variant keeps the indices of its operands and the constants which are
/// needed to push the gradient of the node into its operands.
/// Values of operands are read from the tape when the rule is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum _Rule {
    // nullary
    Leaf,

    // unary
    Pow { arg: usize, exp: f64 },
    Exp { arg: usize },
    Tanh { arg: usize },
    Sin { arg: usize },
    Cos { arg: usize },
    Sigmoid { arg: usize },

    // binary
    Add { lhs: usize, rhs: usize },
    Mul { lhs: usize, rhs: usize },
}

impl _Rule {
    /// Operands of the node in the order they were given.
    #[inline]
    pub(crate) fn _parents(&self) -> impl DoubleEndedIterator<Item = usize> {
        let (first, second) = match *self {
            _Rule::Leaf => (None, None),
            _Rule::Pow { arg, .. }
            | _Rule::Exp { arg }
            | _Rule::Tanh { arg }
            | _Rule::Sin { arg }
            | _Rule::Cos { arg }
            | _Rule::Sigmoid { arg } => (Some(arg), None),
            _Rule::Add { lhs, rhs } | _Rule::Mul { lhs, rhs } => (Some(lhs), Some(rhs)),
        };
        first.into_iter().chain(second)
    }

    #[inline]
    pub(crate) fn _is_binary(&self) -> bool {
        matches!(self, _Rule::Add { .. } | _Rule::Mul { .. })
    }
}

// -----------------------------------------------------------------------------
// _TapeCell
// -----------------------------------------------------------------------------
#[derive(Debug)]
pub(crate) struct _TapeCell {
    pub(crate) value: f64,
    pub(crate) grad: f64,
    pub(crate) rule: _Rule,
    pub(crate) op: Operation,
    pub(crate) label: Option<String>,
    refcnt: usize,
}

// -----------------------------------------------------------------------------
// _Tape
// -----------------------------------------------------------------------------
/// Arena of nodes.
///
/// Nodes are addressed by their index in `cells`, so a node shared by several
/// children is stored once and its gradient is visible from every path.
///
/// Each cell counts the references to it: one per [crate::Node] handle and
/// one per child using it as an operand.
/// When the count drops to zero, the cell releases its operands and its index
/// is pushed to `vacancy` so that the next registration overwrites it.
#[derive(Debug, Default)]
pub(crate) struct _Tape {
    cells: Vec<_TapeCell>,
    vacancy: Vec<usize>,
    next_nodes: Vec<usize>,
}

impl _Tape {
    #[inline]
    pub(crate) fn _cell(&self, idx: usize) -> &_TapeCell {
        self.cells.get(idx).expect("Tape must manage this node")
    }

    #[inline]
    pub(crate) fn _cell_mut(&mut self, idx: usize) -> &mut _TapeCell {
        self.cells.get_mut(idx).expect("Tape must manage this node")
    }

    /// Number of cells which are referred by someone.
    #[inline]
    pub(crate) fn _live_len(&self) -> usize {
        self.cells.len() - self.vacancy.len()
    }

    /// Number of cells including vacant ones.
    #[inline]
    pub(crate) fn _capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub(crate) fn _live_cells_mut(&mut self) -> impl Iterator<Item = &mut _TapeCell> {
        self.cells.iter_mut().filter(|cell| cell.refcnt != 0)
    }

    #[inline]
    pub(crate) fn _reg_leaf(&mut self, value: f64, label: Option<String>) -> usize {
        self._reg_cell(_TapeCell {
            value,
            grad: 0.0,
            rule: _Rule::Leaf,
            op: Operation::None,
            label,
            refcnt: 1,
        })
    }

    /// Register a node produced by an operation.
    ///
    /// Operands of `rule` must be live cells of this tape.
    #[inline]
    pub(crate) fn _reg_node(&mut self, value: f64, rule: _Rule, op: Operation) -> usize {
        for parent in rule._parents() {
            self._incl_refcnt(parent);
        }
        self._reg_cell(_TapeCell {
            value,
            grad: 0.0,
            rule,
            op,
            label: None,
            refcnt: 1,
        })
    }

    #[inline]
    fn _reg_cell(&mut self, cell: _TapeCell) -> usize {
        if let Some(idx) = self.vacancy.pop() {
            *self._cell_mut(idx) = cell;
            idx
        } else {
            self.cells.push(cell);
            self.cells.len() - 1
        }
    }

    #[inline]
    pub(crate) fn _incl_refcnt(&mut self, idx: usize) {
        self._cell_mut(idx).refcnt += 1;
    }

    pub(crate) fn _decl_refcnt(&mut self, idx: usize) {
        // iterative rather than recursive to avoid stack overflow on deep graphs
        let stack = &mut self.next_nodes;
        stack.clear();
        stack.push(idx);

        while let Some(idx) = stack.pop() {
            let Some(cell) = self.cells.get_mut(idx) else {
                continue;
            };
            if cell.refcnt == 0 {
                continue;
            }
            cell.refcnt -= 1;
            if cell.refcnt != 0 {
                continue;
            }
            cell.label = None;
            self.vacancy.push(idx);
            stack.extend(cell.rule._parents());
        }
    }
}

// -----------------------------------------------------------------------------
// _BackPropWorkSpace
// -----------------------------------------------------------------------------
/// Buffers reused among traversals of the tape.
#[derive(Debug, Default)]
pub(crate) struct _BackPropWorkSpace {
    visited: Vec<bool>,
    stack: Vec<(usize, bool)>,
    order: Vec<usize>,
}

impl _BackPropWorkSpace {
    /// Topological order of the nodes reachable from `root`.
    ///
    /// This is the post-order of a depth-first search which visits operands
    /// from left to right, so every operand appears before the nodes using it
    /// and `root` comes last.
    /// Each node appears exactly once even if it is reachable through many paths.
    pub(crate) fn _topo_order(&mut self, tape: &_Tape, root: usize) -> &[usize] {
        let visited = &mut self.visited;
        visited.clear();
        visited.resize(tape._capacity(), false);

        let order = &mut self.order;
        order.clear();

        // the flag tells whether the operands of the node are already pushed
        let stack = &mut self.stack;
        stack.clear();
        stack.push((root, false));

        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
                continue;
            }
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.push((idx, true));

            // push in reverse so that the left operand is visited first
            for parent in tape._cell(idx).rule._parents().rev() {
                if !visited[parent] {
                    stack.push((parent, false));
                }
            }
        }
        order
    }

    /// Propagate gradient from `root` to every node reachable from it.
    ///
    /// The gradient of `root` is set to one and the others are accumulated,
    /// so calling this twice without resetting gradients doubles them.
    pub(crate) fn _back_prop(&mut self, tape: &mut _Tape, root: usize) {
        self._topo_order(tape, root);
        log::debug!(
            "Start back propagation from node {} over {} nodes",
            root,
            self.order.len()
        );

        tape._cell_mut(root).grad = 1.0;
        for &idx in self.order.iter().rev() {
            _back_prop_step(tape, idx);
        }

        log::debug!("Finish back propagation from node {}", root);
    }
}

/// Push the gradient of the node at `idx` into its operands.
fn _back_prop_step(tape: &mut _Tape, idx: usize) {
    let cell = tape._cell(idx);
    let (seed, value, rule) = (cell.grad, cell.value, cell.rule);
    log::trace!("Propagate gradient {} of node {} ({:?})", seed, idx, rule);

    let arg_value = |tape: &_Tape, arg: usize| tape._cell(arg).value;
    let accum = |tape: &mut _Tape, arg: usize, grad: f64| tape._cell_mut(arg).grad += grad;

    match rule {
        // nullary
        _Rule::Leaf => {}

        // unary
        _Rule::Pow { arg, exp } => {
            let x = arg_value(tape, arg);
            accum(tape, arg, exp * x.powf(exp - 1.0) * seed);
        }
        _Rule::Exp { arg } => {
            accum(tape, arg, value * seed);
        }
        _Rule::Tanh { arg } => {
            accum(tape, arg, (1.0 - value * value) * seed);
        }
        _Rule::Sin { arg } => {
            let x = arg_value(tape, arg);
            accum(tape, arg, x.cos() * seed);
        }
        _Rule::Cos { arg } => {
            let x = arg_value(tape, arg);
            accum(tape, arg, -x.sin() * seed);
        }
        _Rule::Sigmoid { arg } => {
            accum(tape, arg, value * (1.0 - value) * seed);
        }

        // binary
        _Rule::Add { lhs, rhs } => {
            accum(tape, lhs, seed);
            accum(tape, rhs, seed);
        }
        _Rule::Mul { lhs, rhs } => {
            let lhs_val = arg_value(tape, lhs);
            let rhs_val = arg_value(tape, rhs);
            accum(tape, lhs, rhs_val * seed);
            accum(tape, rhs, lhs_val * seed);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Graph;

    //
    // memory management related tests.
    // cells are private but the bookkeeping decides which gradients survive
    // so we test it here.
    //
    #[test]
    fn test_refcnt_leaf() {
        let graph = Graph::new();

        {
            let x1 = graph.leaf(4.2);
            let x2 = graph.leaf(4.3);
            let x3 = x1.clone();

            assert_eq!(graph.0.borrow().tape.cells.len(), 2);
            assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 2);
            assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 1);
            assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
            let _ = (x2, x3);
        }

        assert_eq!(graph.0.borrow().tape.cells.len(), 2);
        assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 2);
    }

    #[test]
    fn test_refcnt_unary() {
        let graph = Graph::new();

        let x1 = graph.leaf(4.2);
        {
            let x2 = x1.exp();
            let x3 = x2.clone();
            let x4 = x2.clone();
            assert_eq!(graph.0.borrow().tape.cells.len(), 2);
            assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 2);
            assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 3);
            assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
            let _ = (x3, x4);
        }

        assert_eq!(graph.0.borrow().tape.cells.len(), 2);
        assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 1);
        assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.vacancy, vec![1]);
    }

    #[test]
    fn test_refcnt_binary() {
        let graph = Graph::new();

        let x1 = graph.leaf(4.2);
        let x2 = graph.leaf(4.3);
        {
            let x3 = &x1 * &x2;
            let x4 = x3.clone();
            assert_eq!(graph.0.borrow().tape.cells.len(), 3);
            assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 2);
            assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 2);
            assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 2);
            let _ = x4;
        }

        assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 1);
        assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 1);
        assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.vacancy, vec![2]);
    }

    #[test]
    fn test_refcnt_literal_operand() {
        let graph = Graph::new();

        let x1 = graph.leaf(4.2);
        {
            // the literal becomes a leaf owned only by the sum
            let x2 = &x1 + 3.0;
            assert_eq!(graph.0.borrow().tape.cells.len(), 3);
            assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 2);
            assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 1);
            assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 1);
            let _ = x2;
        }

        assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 1);
        assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 0);
        assert_eq!(graph.0.borrow().tape.vacancy, vec![2, 1]);
    }

    #[test]
    fn test_refcnt_recursive_decl() {
        let graph = Graph::new();

        {
            let x1 = graph.leaf(4.2);
            let x2 = &x1 + &x1;
            let x3 = &x2 + x2.clone();
            let x4 = x3.clone();

            assert_eq!(graph.0.borrow().tape.cells.len(), 3);
            assert_eq!(graph.0.borrow().tape.cells[0].refcnt, 3);
            assert_eq!(graph.0.borrow().tape.cells[1].refcnt, 3);
            assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 2);
            let _ = x4;
        }

        assert_eq!(graph.0.borrow().tape.cells.len(), 3);
        assert!(graph.0.borrow().tape.cells.iter().all(|c| c.refcnt == 0));
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 3);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_reuse_vacant_cell() {
        let graph = Graph::new();

        let x1 = graph.leaf(4.2);
        let x2 = graph.leaf(4.3);
        {
            let _ = &x1 * &x2;
        }
        assert_eq!(graph.0.borrow().tape.vacancy, vec![2]);

        let x3 = &x1 + &x2;

        // vacancy is popped and cells[2] is reused
        assert_eq!(graph.0.borrow().tape.cells.len(), 3);
        assert_eq!(graph.0.borrow().tape.cells[2].refcnt, 1);
        approx::assert_abs_diff_eq!(graph.0.borrow().tape.cells[2].value, 8.5, epsilon = 1e-12);
        assert_eq!(graph.0.borrow().tape.vacancy.len(), 0);
        let _ = x3;
    }

    //
    // traversal
    //
    #[test]
    fn test_topo_order_shared_operand() {
        let graph = Graph::new();
        let a = graph.leaf(2.0);
        let b = &a + &a;
        let c = &b * &a;

        let order = {
            let internal = &mut *graph.0.borrow_mut();
            internal.workspace._topo_order(&internal.tape, c.index).to_vec()
        };

        assert_eq!(order, vec![a.index, b.index, c.index]);
    }

    #[test]
    fn test_topo_order_left_first() {
        let graph = Graph::new();
        let x = graph.leaf(1.0);
        let y = graph.leaf(2.0);
        let z = &y * &x;

        let order = {
            let internal = &mut *graph.0.borrow_mut();
            internal.workspace._topo_order(&internal.tape, z.index).to_vec()
        };

        assert_eq!(order, vec![y.index, x.index, z.index]);
    }
}
