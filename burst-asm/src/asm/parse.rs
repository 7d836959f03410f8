//! Line-level grammar for assembly source.
//!
//! One line is `[label:] [instruction | .directive] [; comment]`. This module
//! turns a raw line into a [`Stmt`]; mnemonic resolution, operand typing and
//! range checks happen in the driver, which knows the opcode table.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::{char, digit1, hex_digit1, none_of, satisfy},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::{Cond, RegId};

/// A parse failure, before a line number is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseError {
    Syntax(String),
    BadOperand(String),
    BadDirective(String),
}

/// A parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stmt<'a> {
    pub label: Option<&'a str>,
    pub body: Option<Body<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Body<'a> {
    Instr {
        /// Explicit `if<cond>` prefix, if any. `None` still allows the
        /// mnemonic to be a legacy alias carrying its own condition.
        cond: Option<Cond>,
        mnemonic: &'a str,
        operands: Vec<Operand<'a>>,
    },
    Directive(Directive<'a>),
}

/// A numeric literal or a symbol reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Value<'a> {
    Num(i64),
    Sym(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand<'a> {
    Reg(RegId),
    /// `#value`; the `#` sigil is mandatory for immediate slots.
    Imm(Value<'a>),
    /// `[base]` or `[base+off]` / `[base-off]`.
    Mem { base: RegId, offset: i64 },
    /// Bare number or label, as used by JMP/CALL.
    Addr(Value<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive<'a> {
    Byte(Vec<Value<'a>>),
    Word(Vec<Value<'a>>),
    Str(String),
    Space(u32),
}

fn ident(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(i)
}

fn number(i: &str) -> IResult<&str, i64> {
    let (i, neg) = opt(char('-'))(i)?;
    let (i, magnitude) = alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |h: &str| {
            i64::from_str_radix(h, 16)
        }),
        map_res(digit1, |d: &str| d.parse::<i64>()),
    ))(i)?;
    Ok((i, if neg.is_some() { -magnitude } else { magnitude }))
}

fn string_literal(i: &str) -> IResult<&str, String> {
    let escape = preceded(
        char('\\'),
        alt((
            value('\n', char('n')),
            value('\r', char('r')),
            value('\t', char('t')),
            value('"', char('"')),
            value('\\', char('\\')),
        )),
    );
    delimited(
        char('"'),
        fold_many0(alt((none_of("\"\\"), escape)), String::new, |mut acc, c| {
            acc.push(c);
            acc
        }),
        char('"'),
    )(i)
}

/// `label:` with the colon directly attached to the identifier.
fn label_prefix(i: &str) -> IResult<&str, &str> {
    terminated(ident, char(':'))(i)
}

/// Drop a `;` comment, ignoring semicolons inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (pos, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..pos],
            _ => {}
        }
    }
    line
}

/// Condition prefix of a mnemonic token: `if` alone means ALWAYS.
fn cond_prefix(token: &str) -> Option<Cond> {
    token
        .strip_prefix("if")
        .and_then(Cond::from_suffix)
}

/// `rN` with a decimal index; other `r…` digit tokens are hard errors.
fn try_register(token: &str) -> Result<Option<RegId>, ParseError> {
    let digits = match token.strip_prefix('r').or_else(|| token.strip_prefix('R')) {
        Some(d) if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()) => d,
        _ => return Ok(None),
    };
    let index: u32 = digits
        .parse()
        .map_err(|_| ParseError::BadOperand(format!("invalid register `{token}`")))?;
    u8::try_from(index)
        .ok()
        .and_then(RegId::new)
        .map(Some)
        .ok_or_else(|| ParseError::BadOperand(format!("invalid register `{token}`")))
}

fn parse_value(token: &str) -> Result<Value<'_>, ParseError> {
    if token.is_empty() {
        return Err(ParseError::Syntax("expected a value".into()));
    }
    if let Ok((_, n)) = all_consuming(number)(token) {
        return Ok(Value::Num(n));
    }
    if let Ok((_, sym)) = all_consuming(ident)(token) {
        return Ok(Value::Sym(sym));
    }
    Err(ParseError::Syntax(format!("malformed value `{token}`")))
}

fn parse_mem(token: &str) -> Result<Operand<'_>, ParseError> {
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ParseError::Syntax(format!("malformed memory operand `{token}`")))?
        .trim();

    let (base_str, offset) = match inner.find(|c| c == '+' || c == '-') {
        Some(pos) => {
            let sign = if inner[pos..].starts_with('-') { -1 } else { 1 };
            let magnitude = inner[pos + 1..].trim();
            let (_, n) = all_consuming(number)(magnitude).map_err(|_| {
                ParseError::Syntax(format!("malformed memory offset in `{token}`"))
            })?;
            (inner[..pos].trim_end(), sign * n)
        }
        None => (inner, 0),
    };

    let base = try_register(base_str)?.ok_or_else(|| {
        ParseError::BadOperand(format!("memory operand base in `{token}` must be a register"))
    })?;

    Ok(Operand::Mem { base, offset })
}

fn classify_operand(token: &str) -> Result<Operand<'_>, ParseError> {
    if token.is_empty() {
        return Err(ParseError::Syntax("expected an operand".into()));
    }
    if token.contains(':') {
        return Err(ParseError::Syntax(format!("`:` in invalid position in `{token}`")));
    }
    if let Some(rest) = token.strip_prefix('#') {
        return Ok(Operand::Imm(parse_value(rest.trim())?));
    }
    if token.starts_with('[') {
        return parse_mem(token);
    }
    if let Some(reg) = try_register(token)? {
        return Ok(Operand::Reg(reg));
    }
    Ok(Operand::Addr(parse_value(token)?))
}

fn parse_directive<'a>(name: &'a str, args: &'a str) -> Result<Directive<'a>, ParseError> {
    fn values_list<'a>(name: &str, args: &'a str) -> Result<Vec<Value<'a>>, ParseError> {
        if args.trim().is_empty() {
            return Err(ParseError::BadDirective(format!(
                "`.{name}` expects at least one value"
            )));
        }
        args.split(',').map(|tok| parse_value(tok.trim())).collect()
    }

    match name {
        "byte" | "db" => values_list(name, args).map(Directive::Byte),
        "word" | "dw" => values_list(name, args).map(Directive::Word),
        "string" | "ascii" => {
            let (_, s) = all_consuming(string_literal)(args.trim()).map_err(|_| {
                ParseError::BadDirective(format!("`.{name}` expects a double-quoted string"))
            })?;
            Ok(Directive::Str(s))
        }
        "space" | "skip" => {
            let (_, n) = all_consuming(number)(args.trim()).map_err(|_| {
                ParseError::BadDirective(format!("`.{name}` expects a byte count"))
            })?;
            u32::try_from(n)
                .map(Directive::Space)
                .map_err(|_| ParseError::BadDirective(format!("`.{name}` count out of range")))
        }
        _ => Err(ParseError::BadDirective(format!("unknown directive `.{name}`"))),
    }
}

/// Parse one source line.
pub(crate) fn parse_line(line: &str) -> Result<Stmt<'_>, ParseError> {
    let code = strip_comment(line);
    let mut rest = code.trim();

    let label = match label_prefix(rest) {
        Ok((tail, label)) => {
            rest = tail.trim_start();
            Some(label)
        }
        Err(_) => None,
    };

    if rest.is_empty() {
        return Ok(Stmt { label, body: None });
    }

    if let Some(after_dot) = rest.strip_prefix('.') {
        let (tail, name) = ident(after_dot).map_err(|_| {
            ParseError::BadDirective(format!("malformed directive `{rest}`"))
        })?;
        let directive = parse_directive(name, tail.trim())?;
        return Ok(Stmt {
            label,
            body: Some(Body::Directive(directive)),
        });
    }

    let (tail, first) = ident(rest)
        .map_err(|_| ParseError::Syntax(format!("expected a mnemonic, found `{rest}`")))?;

    // data directives are also accepted without the leading dot, which is
    // what the disassembler's `db` fallback lines use
    if matches!(
        first,
        "byte" | "db" | "word" | "dw" | "string" | "ascii" | "space" | "skip"
    ) {
        let directive = parse_directive(first, tail.trim())?;
        return Ok(Stmt {
            label,
            body: Some(Body::Directive(directive)),
        });
    }

    let (cond, mnemonic, tail) = match cond_prefix(first) {
        Some(cond) => {
            let tail = tail.trim_start();
            let (tail, mnemonic) = ident(tail).map_err(|_| {
                ParseError::Syntax("expected a mnemonic after the condition prefix".into())
            })?;
            (Some(cond), mnemonic, tail)
        }
        None => (None, first, tail),
    };

    let mut operands = Vec::new();
    let ops_str = tail.trim();
    if !ops_str.is_empty() {
        for token in ops_str.split(',') {
            operands.push(classify_operand(token.trim())?);
        }
    }

    Ok(Stmt {
        label,
        body: Some(Body::Instr {
            cond,
            mnemonic,
            operands,
        }),
    })
}
