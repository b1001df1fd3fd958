mod graph_impl;
mod graphviz;
mod tape;

pub(crate) use tape::_Rule;

pub use graph_impl::Graph;
pub use graphviz::GraphvizBuilder;
