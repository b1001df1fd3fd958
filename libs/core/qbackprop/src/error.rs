// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Operand is not acceptable for an operation '{0}'")]
    InvalidOperand(&'static str),
    #[error("Different graphs are used for an operation '{0}'")]
    DifferentGraphs(&'static str),
    #[error("Gradients are already propagated on this graph. Reset them before the next backward")]
    AlreadyDifferentiated,
}
