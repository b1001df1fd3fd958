mod config;
mod error;
mod graph;
mod node;
mod operation;

pub use config::GraphConfig;
pub use error::Error;
pub use graph::{Graph, GraphvizBuilder};
pub use node::{Node, Operand};
pub use operation::Operation;
