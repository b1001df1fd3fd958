use std::{cell::RefCell, rc::Rc};

use crate::{GraphConfig, Node};

use super::tape::{_BackPropWorkSpace, _Tape};

// -----------------------------------------------------------------------------
// _Graph
// Graph
// -----------------------------------------------------------------------------
#[derive(Debug)]
pub(crate) struct _Graph {
    pub(crate) tape: _Tape,
    pub(crate) workspace: _BackPropWorkSpace,
    pub(crate) config: GraphConfig,
    /// Root of the last backward pass until its gradients are reset.
    /// Only consulted in strict mode.
    pub(crate) differentiated: Option<usize>,
}

/// Container of nodes.
///
/// This is a shared handle: clones refer to the same nodes.
/// Nodes of different graphs can not be combined.
#[derive(Debug)]
pub struct Graph(pub(crate) Rc<RefCell<_Graph>>);

impl Clone for Graph {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

//
// ctor
//
impl Default for Graph {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    #[inline]
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    #[inline]
    pub fn with_config(config: GraphConfig) -> Self {
        Self(Rc::new(RefCell::new(_Graph {
            tape: _Tape::default(),
            workspace: _BackPropWorkSpace::default(),
            config,
            differentiated: None,
        })))
    }
}

//
// methods
//
impl Graph {
    #[inline]
    pub fn config(&self) -> GraphConfig {
        self.0.borrow().config.clone()
    }

    /// Create a new leaf node which belongs to this graph.
    ///
    /// Any float is accepted, including infinities and NaN.
    #[inline]
    pub fn leaf(&self, value: f64) -> Node {
        let index = self.0.borrow_mut().tape._reg_leaf(value, None);
        Node::_new(self.clone(), index)
    }

    #[inline]
    pub fn leaf_labeled(&self, label: impl Into<String>, value: f64) -> Node {
        let index = self
            .0
            .borrow_mut()
            .tape
            ._reg_leaf(value, Some(label.into()));
        Node::_new(self.clone(), index)
    }

    /// Check that two graphs are the same instance.
    ///
    /// Note that this comparison is not based on the contents of the graphs.
    #[inline]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Rc::ptr_eq(&lhs.0, &rhs.0)
    }

    /// Number of nodes alive in this graph.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.borrow().tape._live_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set gradients of all nodes in this graph to zero.
    pub fn reset_all_gradients(&self) {
        let mut internal = self.0.borrow_mut();
        let mut cnt = 0usize;
        for cell in internal.tape._live_cells_mut() {
            cell.grad = 0.0;
            cnt += 1;
        }
        internal.differentiated = None;
        log::debug!("Reset gradients of {} nodes", cnt);
    }
}
