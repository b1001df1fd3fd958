use std::fmt::Display;

// -----------------------------------------------------------------------------
// Operation
// -----------------------------------------------------------------------------
/// Tag recording how a node was produced.
///
/// The tag is informational only. Composite operations such as subtraction
/// are tagged with what the caller wrote, while their gradients flow through
/// the primitive operations they are built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Leaf node wrapping a raw number.
    None,
    Add,
    Mul,
    /// Power with a constant exponent.
    Pow(f64),
    Neg,
    Sub,
    Div,
    Exp,
    Tanh,
    Sin,
    Cos,
    Sigmoid,
}

impl Display for Operation {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::None => write!(f, ""),
            Operation::Add => write!(f, "+"),
            Operation::Mul => write!(f, "*"),
            Operation::Pow(exp) => write!(f, "**{}", exp),
            Operation::Neg => write!(f, "neg"),
            Operation::Sub => write!(f, "-"),
            Operation::Div => write!(f, "/"),
            Operation::Exp => write!(f, "exp"),
            Operation::Tanh => write!(f, "tanh"),
            Operation::Sin => write!(f, "sin"),
            Operation::Cos => write!(f, "cos"),
            Operation::Sigmoid => write!(f, "sigmoid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Operation::None, "")]
    #[case(Operation::Add, "+")]
    #[case(Operation::Mul, "*")]
    #[case(Operation::Pow(2.0), "**2")]
    #[case(Operation::Pow(-1.0), "**-1")]
    #[case(Operation::Pow(0.5), "**0.5")]
    #[case(Operation::Neg, "neg")]
    #[case(Operation::Sub, "-")]
    #[case(Operation::Div, "/")]
    #[case(Operation::Exp, "exp")]
    #[case(Operation::Tanh, "tanh")]
    #[case(Operation::Sin, "sin")]
    #[case(Operation::Cos, "cos")]
    #[case(Operation::Sigmoid, "sigmoid")]
    fn test_fmt(#[case] op: Operation, #[case] expected: &str) {
        assert_eq!(op.to_string(), expected);
    }
}
