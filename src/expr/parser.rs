//! Hand-written Pratt parser for expression text.
//!
//! Grammar, from loosest to tightest binding:
//!
//! ```text
//! expr     := or ('?' expr ':' expr)?
//! or       := and ('||' and)*
//! and      := equality ('&&' equality)*
//! equality := relation (('==' | '!=') relation)*
//! relation := sum (('<' | '<=' | '>' | '>=') sum)*
//! sum      := product (('+' | '-') product)*
//! product  := power (('*' | '/' | '%') power)*
//! power    := prefix ('^' power)?
//! prefix   := ('-' | '!') prefix | atom
//! atom     := literal | 'index' | 'sizeof' '(' ident ')' | ident | ident '(' args ')' | '(' expr ')'
//! ```

use std::ops::Range;

use super::ast::{BinaryOp, Node, UnaryOp, PREC_CONDITIONAL};
use super::error::SyntaxError;
use super::lexer::{tokenize, Token};
use crate::par::Value;

/// Token stream with lookahead and byte position tracking.
struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    text_len: usize,
}

impl<'src> TokenStream<'src> {
    fn new(tokens: &'src [(Token, Range<usize>)], text_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            text_len,
        }
    }

    fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Byte offset of the current token, or the end of text at EOF.
    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.text_len)
    }

    fn expect(&mut self, expected: Token, context: &str) -> Result<(), SyntaxError> {
        if self.peek() == Some(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}' {}", expected, context)))
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => format!("'{}'", token),
            None => "end of expression".to_owned(),
        };
        SyntaxError::new(format!("expected {}, found {}", expected, found), self.position())
    }
}

/// Parses expression text into a syntax tree.
///
/// The special values `default` and `ask` are recognized but rejected, they must be handled by the caller.
pub fn parse(text: &str) -> Result<Node, SyntaxError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("empty expression", 0));
    }
    let mut stream = TokenStream::new(&tokens, text.len());
    let node = parse_expr(&mut stream, 0)?;
    if !stream.at_end() {
        return Err(stream.unexpected("operator or end of expression"));
    }
    Ok(node)
}

fn binary_op_info(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::OrOr => Some(BinaryOp::Or),
        Token::AndAnd => Some(BinaryOp::And),
        Token::EqEq => Some(BinaryOp::Eq),
        Token::BangEq => Some(BinaryOp::Ne),
        Token::Lt => Some(BinaryOp::Lt),
        Token::LtEq => Some(BinaryOp::Le),
        Token::Gt => Some(BinaryOp::Gt),
        Token::GtEq => Some(BinaryOp::Ge),
        Token::Plus => Some(BinaryOp::Add),
        Token::Minus => Some(BinaryOp::Sub),
        Token::Star => Some(BinaryOp::Mul),
        Token::Slash => Some(BinaryOp::Div),
        Token::Percent => Some(BinaryOp::Mod),
        Token::Caret => Some(BinaryOp::Pow),
        _ => None,
    }
}

fn parse_expr(stream: &mut TokenStream, min_prec: u8) -> Result<Node, SyntaxError> {
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        if let Some(op) = binary_op_info(token) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            stream.advance();
            let next_prec = if op.is_right_assoc() { prec } else { prec + 1 };
            let right = parse_expr(stream, next_prec)?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        } else if *token == Token::Question {
            if PREC_CONDITIONAL < min_prec {
                break;
            }
            stream.advance();
            let then = parse_expr(stream, 0)?;
            stream.expect(Token::Colon, "in conditional expression")?;
            let otherwise = parse_expr(stream, PREC_CONDITIONAL)?;
            left = Node::Conditional {
                cond: Box::new(left),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            };
        } else {
            break;
        }
    }

    Ok(left)
}

fn parse_prefix(stream: &mut TokenStream) -> Result<Node, SyntaxError> {
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Bang) => UnaryOp::Not,
        _ => return parse_atom(stream),
    };
    stream.advance();
    let operand = parse_prefix(stream)?;
    Ok(Node::Unary {
        op,
        operand: Box::new(operand),
    })
}

fn parse_atom(stream: &mut TokenStream) -> Result<Node, SyntaxError> {
    let position = stream.position();
    let token = match stream.advance() {
        Some(token) => token,
        None => return Err(stream.unexpected("operand")),
    };
    match token {
        Token::True => Ok(Node::Literal(Value::Bool(true))),
        Token::False => Ok(Node::Literal(Value::Bool(false))),
        Token::Integer(i) => Ok(Node::Literal(Value::Long(*i))),
        Token::Float(x) => Ok(Node::Literal(Value::Double(*x))),
        Token::String(s) => Ok(Node::Literal(Value::String(s.clone()))),
        Token::Index => Ok(Node::Index),
        Token::SizeOf => {
            stream.expect(Token::LParen, "after 'sizeof'")?;
            let name = match stream.peek() {
                Some(Token::Ident(name)) => name.clone(),
                _ => return Err(stream.unexpected("vector name")),
            };
            stream.advance();
            stream.expect(Token::RParen, "after vector name")?;
            Ok(Node::SizeOf(name))
        }
        Token::Ident(name) => {
            if stream.peek() == Some(&Token::LParen) {
                stream.advance();
                let args = parse_call_args(stream)?;
                Ok(Node::Call {
                    function: name.clone(),
                    args,
                })
            } else {
                Ok(Node::Name(name.clone()))
            }
        }
        Token::LParen => {
            let inner = parse_expr(stream, 0)?;
            stream.expect(Token::RParen, "to close parenthesis")?;
            Ok(inner)
        }
        Token::Default | Token::Ask => Err(SyntaxError::new(
            format!("'{}' is a special value that must be handled by the caller", token),
            position,
        )),
        other => Err(SyntaxError::new(
            format!("expected operand, found '{}'", other),
            position,
        )),
    }
}

/// Parses call arguments after the opening parenthesis.
fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Node>, SyntaxError> {
    let mut args = Vec::new();
    if stream.peek() == Some(&Token::RParen) {
        stream.advance();
        return Ok(args);
    }
    loop {
        args.push(parse_expr(stream, 0)?);
        match stream.peek() {
            Some(Token::Comma) => {
                stream.advance();
            }
            Some(Token::RParen) => {
                stream.advance();
                return Ok(args);
            }
            _ => return Err(stream.unexpected("',' or ')' in argument list")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(text: &str) -> String {
        parse(text).unwrap().to_string()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(canonical("1+2*3"), "1 + 2 * 3");
        assert_eq!(canonical("(1+2)*3"), "(1 + 2) * 3");
        assert_eq!(canonical("1-(2-3)"), "1 - (2 - 3)");
        assert_eq!(canonical("(1-2)-3"), "1 - 2 - 3");
        assert_eq!(canonical("2^3^2"), "2 ^ 3 ^ 2");
        assert_eq!(canonical("(2^3)^2"), "(2 ^ 3) ^ 2");
        assert_eq!(canonical("-x^2"), "-x ^ 2");
        assert_eq!(canonical("-(x^2)"), "-(x ^ 2)");
        assert_eq!(canonical("a || b && !c"), "a || b && !c");
    }

    #[test]
    fn conditional_is_right_associative() {
        let node = parse("a ? 1 : b ? 2 : 3").unwrap();
        match &node {
            Node::Conditional { otherwise, .. } => assert!(matches!(**otherwise, Node::Conditional { .. })),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(node.to_string(), "a ? 1 : b ? 2 : 3");
        assert_eq!(canonical("(a ? b : c) ? 1 : 2"), "(a ? b : c) ? 1 : 2");
    }

    #[test]
    fn calls_and_context_references() {
        let node = parse("max(index, sizeof(workers) - 1, \"x\")").unwrap();
        match node {
            Node::Call { function, args } => {
                assert_eq!(function, "max");
                assert_eq!(args.len(), 3);
                assert_eq!(args[0], Node::Index);
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(canonical("rand()"), "rand()");
    }

    #[test]
    fn errors_carry_position() {
        let err = parse("1 + * 2").unwrap_err();
        assert_eq!(err.position, 4);

        let err = parse("(1 + 2").unwrap_err();
        assert_eq!(err.position, 6);

        let err = parse("1 2").unwrap_err();
        assert_eq!(err.position, 2);

        let err = parse("f(1,").unwrap_err();
        assert_eq!(err.position, 4);

        assert_eq!(parse("   ").unwrap_err().position, 0);
    }

    #[test]
    fn special_values_are_rejected() {
        let err = parse("default").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("default"));
        assert!(parse("1 + ask").is_err());
    }
}
