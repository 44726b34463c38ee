//! Tokenization of expression text using logos.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use super::error::SyntaxError;

/// Expression token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // === Keywords ===
    /// Boolean literal `true`
    #[token("true")]
    True,
    /// Boolean literal `false`
    #[token("false")]
    False,
    /// Keyword `index`
    #[token("index")]
    Index,
    /// Keyword `sizeof`
    #[token("sizeof")]
    SizeOf,
    /// Special value `default`
    #[token("default")]
    Default,
    /// Special value `ask`
    #[token("ask")]
    Ask,

    // === Operators ===
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `%`
    #[token("%")]
    Percent,
    /// Operator `^`
    #[token("^")]
    Caret,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,
    /// Operator `&&`
    #[token("&&")]
    AndAnd,
    /// Operator `||`
    #[token("||")]
    OrOr,
    /// Operator `!`
    #[token("!")]
    Bang,
    /// Operator `?`
    #[token("?")]
    Question,
    /// Operator `:`
    #[token(":")]
    Colon,
    /// Separator `,`
    #[token(",")]
    Comma,
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,

    // === Literals ===
    /// Integer literal (e.g. `42`). Literals that overflow `i64` are lexing errors.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    /// Float literal (e.g. `3.14`, `1e-3`, `2.5E+7`). Literals that overflow to infinity are lexing errors.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", finite_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", finite_float)]
    Float(f64),

    /// String literal (e.g. `"hello"`), with escapes already resolved
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    String(String),

    /// Identifier (e.g. `delay`, `uniform`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
}

fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                'r' => result.push('\r'),
                't' => result.push('\t'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

fn finite_float(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Text of a non-finite float that parses back into the same value, or `None` for finite values.
pub(crate) fn non_finite_text(x: f64) -> Option<&'static str> {
    if x.is_nan() {
        Some("double(\"NaN\")")
    } else if x == f64::INFINITY {
        Some("double(\"inf\")")
    } else if x == f64::NEG_INFINITY {
        Some("double(\"-inf\")")
    } else {
        None
    }
}

/// Quotes a string so that it lexes back into the same [`Token::String`].
pub(crate) fn quote_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Index => write!(f, "index"),
            Token::SizeOf => write!(f, "sizeof"),
            Token::Default => write!(f, "default"),
            Token::Ask => write!(f, "ask"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::EqEq => write!(f, "=="),
            Token::BangEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{:?}", x),
            Token::String(s) => write!(f, "{}", quote_string(s)),
            Token::Ident(s) => write!(f, "{}", s),
        }
    }
}

/// Splits expression text into tokens paired with their byte spans.
pub fn tokenize(text: &str) -> Result<Vec<(Token, Range<usize>)>, SyntaxError> {
    Token::lexer(text)
        .spanned()
        .map(|(token, span)| match token {
            Ok(token) => Ok((token, span)),
            Err(()) => Err(SyntaxError::new(
                format!("invalid token '{}'", &text[span.clone()]),
                span.start,
            )),
        })
        .collect()
}
