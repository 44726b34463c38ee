//! Expression syntax tree.

use std::fmt;

use super::functions;
use super::lexer::{non_finite_text, quote_string};
use crate::par::Value;

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation `-x`
    Neg,
    /// Logical negation `!x`
    Not,
}

impl UnaryOp {
    /// Operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `a || b`
    Or,
    /// `a && b`
    And,
    /// `a == b`
    Eq,
    /// `a != b`
    Ne,
    /// `a < b`
    Lt,
    /// `a <= b`
    Le,
    /// `a > b`
    Gt,
    /// `a >= b`
    Ge,
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,
    /// `a ^ b`
    Pow,
}

pub(crate) const PREC_CONDITIONAL: u8 = 1;
pub(crate) const PREC_UNARY: u8 = 9;
const PREC_ATOM: u8 = 10;

impl BinaryOp {
    /// Operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }

    /// Binding strength, higher binds tighter.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Ne => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
            BinaryOp::Pow => 8,
        }
    }

    pub(crate) fn is_right_assoc(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal value.
    Literal(Value),
    /// Reference to a parameter or variable resolved through the evaluation context.
    Name(String),
    /// Index of the owning entity within its vector.
    Index,
    /// Size of a named vector.
    SizeOf(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Node>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Node>,
        /// Right operand.
        right: Box<Node>,
    },
    /// Conditional `cond ? then : otherwise`.
    Conditional {
        /// Condition, must evaluate to a bool.
        cond: Box<Node>,
        /// Value if the condition holds.
        then: Box<Node>,
        /// Value otherwise.
        otherwise: Box<Node>,
    },
    /// Function call.
    Call {
        /// Function name.
        function: String,
        /// Arguments in call order.
        args: Vec<Node>,
    },
}

impl Node {
    /// Returns true if the node and all its children can be evaluated without an evaluation context.
    ///
    /// Parameter references, `index`, `sizeof` and random functions make an expression context-dependent.
    pub fn is_constant(&self) -> bool {
        match self {
            Node::Literal(_) => true,
            Node::Name(_) | Node::Index | Node::SizeOf(_) => false,
            Node::Unary { operand, .. } => operand.is_constant(),
            Node::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Node::Conditional { cond, then, otherwise } => {
                cond.is_constant() && then.is_constant() && otherwise.is_constant()
            }
            Node::Call { function, args } => !functions::is_random(function) && args.iter().all(Node::is_constant),
        }
    }

    /// Returns the number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + match self {
            Node::Literal(_) | Node::Name(_) | Node::Index | Node::SizeOf(_) => 0,
            Node::Unary { operand, .. } => operand.size(),
            Node::Binary { left, right, .. } => left.size() + right.size(),
            Node::Conditional { cond, then, otherwise } => cond.size() + then.size() + otherwise.size(),
            Node::Call { args, .. } => args.iter().map(Node::size).sum(),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Node::Conditional { .. } => PREC_CONDITIONAL,
            Node::Binary { op, .. } => op.precedence(),
            Node::Unary { .. } => PREC_UNARY,
            Node::Literal(Value::Long(i)) if *i < 0 => PREC_UNARY,
            Node::Literal(Value::Double(x)) if x.is_sign_negative() => PREC_UNARY,
            _ => PREC_ATOM,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Node {
    /// Writes the canonical text of the expression, which parses back into an equal tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(Value::String(s)) => write!(f, "{}", quote_string(s)),
            Node::Literal(Value::Double(x)) => match non_finite_text(*x) {
                Some(text) => write!(f, "{}", text),
                None => write!(f, "{:?}", x),
            },
            Node::Literal(value) => write!(f, "{}", value),
            Node::Name(name) => write!(f, "{}", name),
            Node::Index => write!(f, "index"),
            Node::SizeOf(name) => write!(f, "sizeof({})", name),
            Node::Unary { op, operand } => {
                write!(f, "{}", op.symbol())?;
                operand.fmt_child(f, operand.precedence() < PREC_UNARY)
            }
            Node::Binary { op, left, right } => {
                let prec = op.precedence();
                let (lp, rp) = (left.precedence(), right.precedence());
                left.fmt_child(f, lp < prec || (lp == prec && op.is_right_assoc()))?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_child(f, rp < prec || (rp == prec && !op.is_right_assoc()))
            }
            Node::Conditional { cond, then, otherwise } => {
                cond.fmt_child(f, cond.precedence() <= PREC_CONDITIONAL)?;
                write!(f, " ? {} : {}", then, otherwise)
            }
            Node::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
