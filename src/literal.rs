//! Reads a template literal back to the string it evaluates to.
//!
//! Only the literal body is lexed: the caller positions the input just after
//! the opening backtick, and reading stops at the first unescaped backtick.
//! Substitutions are rejected since injected stylesheets never contain one.

use logos::Logos;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("unterminated template literal")]
    Unterminated,
    #[error("unexpected substitution `${{` at byte {0}")]
    Substitution(usize),
    #[error("octal escape at byte {0} is not allowed in template literals")]
    LegacyOctal(usize),
    #[error("unpaired surrogate escape at byte {0}")]
    LoneSurrogate(usize),
    #[error("invalid escape `{text}` at byte {offset}")]
    InvalidEscape { offset: usize, text: String },
}

/// A decoded literal body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// The cooked value.
    pub value: String,
    /// Byte offset of the closing backtick within the lexed input.
    pub end: usize,
}

#[derive(Logos, Debug, Clone, PartialEq)]
enum Piece<'a> {
    #[regex(r"[^\\`$\r]+", |lex| lex.slice())]
    Text(&'a str),

    #[token("$")]
    Dollar,

    #[token("${")]
    Substitution,

    #[token("`")]
    Backtick,

    #[token("\r\n")]
    #[token("\r")]
    CarriageReturn,

    #[regex(r"\\[^xu0-9\r\n\x{2028}\x{2029}]", |lex| simple_escape(lex.slice()))]
    Simple(char),

    #[token("\\0")]
    Nul,

    #[regex(r"\\[1-9]|\\0[0-9]")]
    LegacyOctal,

    #[regex(r"\\x[0-9a-fA-F]{2}", |lex| code_point(&lex.slice()[2..]))]
    #[regex(r"\\u[0-9a-fA-F]{4}", |lex| code_point(&lex.slice()[2..]))]
    #[regex(r"\\u\{[0-9a-fA-F]+\}", |lex| {
        let s = lex.slice();
        code_point(&s[3..s.len() - 1])
    })]
    Code(u32),

    #[regex(r"\\(\r\n|\r|\n|\x{2028}|\x{2029})")]
    LineContinuation,
}

fn simple_escape(slice: &str) -> Option<char> {
    let c = slice[1..].chars().next()?;
    Some(match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        other => other,
    })
}

fn code_point(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok().filter(|&c| c <= 0x10FFFF)
}

fn is_high_surrogate(c: u32) -> bool {
    (0xD800..=0xDBFF).contains(&c)
}

fn is_low_surrogate(c: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&c)
}

/// Decode a template literal body up to and excluding its closing backtick.
pub fn read_literal(body: &str) -> Result<Literal, LiteralError> {
    let mut value = String::with_capacity(body.len());
    let mut lexer = Piece::lexer(body);
    let mut pending_high: Option<(u32, usize)> = None;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let piece = result.map_err(|()| LiteralError::InvalidEscape {
            offset: span.start,
            text: body[span.clone()].to_string(),
        })?;

        if let Some((high, at)) = pending_high.take() {
            match piece {
                Piece::Code(low) if is_low_surrogate(low) => {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    value.push(char::from_u32(combined).ok_or(LiteralError::LoneSurrogate(at))?);
                    continue;
                }
                _ => return Err(LiteralError::LoneSurrogate(at)),
            }
        }

        match piece {
            Piece::Text(text) => value.push_str(text),
            Piece::Dollar => value.push('$'),
            Piece::Substitution => return Err(LiteralError::Substitution(span.start)),
            Piece::Backtick => {
                return Ok(Literal {
                    value,
                    end: span.start,
                })
            }
            Piece::CarriageReturn => value.push('\n'),
            Piece::Simple(c) => value.push(c),
            Piece::Nul => value.push('\0'),
            Piece::LegacyOctal => return Err(LiteralError::LegacyOctal(span.start)),
            Piece::Code(c) if is_high_surrogate(c) => pending_high = Some((c, span.start)),
            Piece::Code(c) => {
                let ch = char::from_u32(c).ok_or(LiteralError::LoneSurrogate(span.start))?;
                value.push(ch);
            }
            Piece::LineContinuation => {}
        }
    }

    match pending_high {
        Some((_, at)) => Err(LiteralError::LoneSurrogate(at)),
        None => Err(LiteralError::Unterminated),
    }
}
