//! nom parser for analysis snippets
//!
//! Statements end at a newline or `;`. Inside brackets a newline is plain
//! whitespace, so the grammar functions take a `nested` flag that decides
//! whether [`blank`] may cross a line break. Errors carry the line they were
//! raised on.

use super::ast::{Arg, BinOp, Expr, Stmt, Target, UnOp};
use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, char, digit1, one_of, satisfy},
    combinator::{cut, eof, map, not, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    Finish, IResult,
};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

const IMPORTS: &str = "imports are not available in the sandbox";
const UNSUPPORTED: &str = "is not supported";
const F_STRINGS: &str = "f-strings are not supported";
const ARG_ORDER: &str = "positional argument follows keyword argument";
const BAD_TARGET: &str = "can only assign to a name or name[column]";
const BAD_NUMBER: &str = "invalid number";

/// Statement keywords with no counterpart in the sandbox
const UNSUPPORTED_STATEMENTS: [&str; 9] = [
    "def", "class", "for", "while", "with", "lambda", "if", "try", "return",
];

/// Words that never name a variable
const RESERVED: [&str; 8] = ["and", "or", "not", "if", "else", "in", "is", "lambda"];

/// Parse a snippet into statements
pub fn parse(src: &str) -> Result<Vec<Stmt>> {
    let fail = |e| syntax_error(src, e);
    let mut stmts = Vec::new();
    let (mut input, _) = separators(src).finish().map_err(fail)?;

    while !input.is_empty() {
        let line = line_at(src, input);
        let (rest, (target, expr)) = terminated(statement, end_of_statement)(input)
            .finish()
            .map_err(fail)?;
        stmts.push(match target {
            Some(target) => Stmt::Assign {
                target,
                value: expr,
                line,
            },
            None => Stmt::Expr { expr, line },
        });
        let (rest, _) = separators(rest).finish().map_err(fail)?;
        input = rest;
    }
    Ok(stmts)
}

pub(crate) fn syntax(line: usize, message: &str) -> Error {
    Error::execution(format!("syntax error on line {}: {}", line, message))
}

// ── Lexical pieces ──────────────────────────────────────────────

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn comment(i: &str) -> PResult<'_, &str> {
    recognize(pair(char('#'), take_while(|c: char| c != '\n')))(i)
}

/// Blanks, comments and line continuations; line breaks too when `nested`
fn blank<'a>(nested: bool) -> impl FnMut(&'a str) -> PResult<'a, ()> {
    value(
        (),
        many0(alt((
            take_while1(move |c: char| c == ' ' || c == '\t' || c == '\r' || (nested && c == '\n')),
            tag("\\\n"),
            comment,
        ))),
    )
}

/// Anything that may sit between two statements
fn separators(i: &str) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            take_while1(|c: char| c.is_whitespace() || c == ';'),
            tag("\\\n"),
            comment,
        ))),
    )(i)
}

fn end_of_statement(i: &str) -> PResult<'_, &str> {
    preceded(blank(false), alt((eof, tag("\n"), tag(";"))))(i)
}

fn sym<'a>(nested: bool, s: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(blank(nested), tag(s))
}

/// Operator `s` that is not the prefix of a longer one
fn op<'a>(
    nested: bool,
    s: &'static str,
    longer: &'static str,
) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(blank(nested), terminated(tag(s), not(one_of(longer))))
}

fn keyword<'a>(nested: bool, word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(blank(nested), terminated(tag(word), not(satisfy(is_ident_char))))
}

fn identifier(i: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(i)
}

fn fail_with<'a, T>(input: &'a str, message: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Failure(VerboseError::add_context(
        input,
        message,
        VerboseError::from_error_kind(input, ErrorKind::Verify),
    )))
}

// ── Statements ──────────────────────────────────────────────────

fn assign(i: &str) -> PResult<'_, &str> {
    op(false, "=", "=")(i)
}

fn statement(i: &str) -> PResult<'_, (Option<Target>, Expr)> {
    let start = i;
    if let Ok((after, word)) = identifier(i) {
        if assign(after).is_err() {
            if word == "import" || word == "from" {
                return fail_with(start, IMPORTS);
            }
            if UNSUPPORTED_STATEMENTS.contains(&word) {
                return fail_with(start, UNSUPPORTED);
            }
        }
    }

    let (i, expr) = expression(i, false)?;
    let (i, value) = opt(preceded(assign, cut(|i| expression(i, false))))(i)?;
    let Some(value) = value else {
        return Ok((i, (None, expr)));
    };
    let target = match expr {
        Expr::Name(name) => Target::Name(name),
        Expr::Index(obj, key) => match *obj {
            Expr::Name(name) => Target::Index { name, key: *key },
            _ => return fail_with(start, BAD_TARGET),
        },
        _ => return fail_with(start, BAD_TARGET),
    };
    Ok((i, (Some(target), value)))
}

// ── Expressions, loosest binding first ──────────────────────────

fn expression(i: &str, nested: bool) -> PResult<'_, Expr> {
    let (i, value) = or_expr(i, nested)?;
    let (i, branch) = opt(preceded(
        keyword(nested, "if"),
        cut(pair(
            move |i| or_expr(i, nested),
            preceded(
                context("expected 'else'", keyword(nested, "else")),
                move |i| expression(i, nested),
            ),
        )),
    ))(i)?;
    Ok((
        i,
        match branch {
            Some((cond, other)) => Expr::IfElse(Box::new(cond), Box::new(value), Box::new(other)),
            None => value,
        },
    ))
}

/// Left-associative chain of `operand (op operand)*`
fn chain<'a, O>(
    i: &'a str,
    nested: bool,
    operand: fn(&'a str, bool) -> PResult<'a, Expr>,
    op: O,
) -> PResult<'a, Expr>
where
    O: FnMut(&'a str) -> PResult<'a, BinOp>,
{
    let (i, first) = operand(i, nested)?;
    fold_many0(
        pair(op, cut(move |i| operand(i, nested))),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
    )(i)
}

fn or_expr(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(i, nested, and_expr, value(BinOp::Or, keyword(nested, "or")))
}

fn and_expr(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(i, nested, not_expr, value(BinOp::And, keyword(nested, "and")))
}

fn not_expr(i: &str, nested: bool) -> PResult<'_, Expr> {
    alt((
        map(
            preceded(keyword(nested, "not"), cut(move |i| not_expr(i, nested))),
            |e| Expr::Unary(UnOp::Not, Box::new(e)),
        ),
        move |i| comparison(i, nested),
    ))(i)
}

fn comparison(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(
        i,
        nested,
        bit_or,
        alt((
            value(BinOp::Eq, sym(nested, "==")),
            value(BinOp::Ne, sym(nested, "!=")),
            value(BinOp::Le, sym(nested, "<=")),
            value(BinOp::Ge, sym(nested, ">=")),
            value(BinOp::Lt, sym(nested, "<")),
            value(BinOp::Gt, sym(nested, ">")),
        )),
    )
}

fn bit_or(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(i, nested, bit_and, value(BinOp::BitOr, sym(nested, "|")))
}

fn bit_and(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(i, nested, additive, value(BinOp::BitAnd, sym(nested, "&")))
}

fn additive(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(
        i,
        nested,
        term,
        alt((
            value(BinOp::Add, sym(nested, "+")),
            value(BinOp::Sub, sym(nested, "-")),
        )),
    )
}

fn term(i: &str, nested: bool) -> PResult<'_, Expr> {
    chain(
        i,
        nested,
        unary,
        alt((
            value(BinOp::FloorDiv, sym(nested, "//")),
            value(BinOp::Div, sym(nested, "/")),
            value(BinOp::Mul, op(nested, "*", "*")),
            value(BinOp::Mod, sym(nested, "%")),
        )),
    )
}

fn unary(i: &str, nested: bool) -> PResult<'_, Expr> {
    alt((
        map(
            preceded(sym(nested, "-"), cut(move |i| unary(i, nested))),
            |e| Expr::Unary(UnOp::Neg, Box::new(e)),
        ),
        map(
            preceded(sym(nested, "~"), cut(move |i| unary(i, nested))),
            |e| Expr::Unary(UnOp::Invert, Box::new(e)),
        ),
        preceded(sym(nested, "+"), cut(move |i| unary(i, nested))),
        move |i| power(i, nested),
    ))(i)
}

/// `**` is right associative and binds tighter than a unary minus on its left
fn power(i: &str, nested: bool) -> PResult<'_, Expr> {
    let (i, base) = postfix(i, nested)?;
    let (i, exp) = opt(preceded(sym(nested, "**"), cut(move |i| unary(i, nested))))(i)?;
    Ok((
        i,
        match exp {
            Some(exp) => Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)),
            None => base,
        },
    ))
}

enum Trailer {
    Attr(String),
    Call(Vec<Arg>),
    Index(Expr),
}

fn postfix(i: &str, nested: bool) -> PResult<'_, Expr> {
    let (i, head) = atom(i, nested)?;
    fold_many0(
        move |i| trailer(i, nested),
        move || head.clone(),
        |expr, trailer| match trailer {
            Trailer::Attr(name) => Expr::Attr(Box::new(expr), name),
            Trailer::Call(args) => Expr::Call(Box::new(expr), args),
            Trailer::Index(key) => Expr::Index(Box::new(expr), Box::new(key)),
        },
    )(i)
}

fn trailer(i: &str, nested: bool) -> PResult<'_, Trailer> {
    alt((
        map(
            preceded(
                sym(nested, "."),
                context(
                    "expected attribute name",
                    cut(preceded(blank(nested), identifier)),
                ),
            ),
            |name| Trailer::Attr(name.to_string()),
        ),
        map(
            preceded(
                sym(nested, "("),
                cut(terminated(arguments, context("expected ')'", sym(true, ")")))),
            ),
            Trailer::Call,
        ),
        map(
            preceded(
                sym(nested, "["),
                cut(terminated(
                    |i| expression(i, true),
                    context("expected ']'", sym(true, "]")),
                )),
            ),
            Trailer::Index,
        ),
    ))(i)
}

fn arguments(i: &str) -> PResult<'_, Vec<Arg>> {
    let start = i;
    let (i, args) = terminated(separated_list0(sym(true, ","), argument), opt(sym(true, ",")))(i)?;
    let mut keyword_seen = false;
    for arg in &args {
        if arg.name.is_some() {
            keyword_seen = true;
        } else if keyword_seen {
            return fail_with(start, ARG_ORDER);
        }
    }
    Ok((i, args))
}

fn argument(i: &str) -> PResult<'_, Arg> {
    alt((
        map(
            separated_pair(
                preceded(blank(true), identifier),
                op(true, "=", "="),
                cut(|i| expression(i, true)),
            ),
            |(name, value)| Arg {
                name: Some(name.to_string()),
                value,
            },
        ),
        map(|i| expression(i, true), |value| Arg { name: None, value }),
    ))(i)
}

// ── Atoms ───────────────────────────────────────────────────────

fn atom(i: &str, nested: bool) -> PResult<'_, Expr> {
    preceded(
        blank(nested),
        alt((
            group,
            map(
                preceded(
                    char('['),
                    cut(terminated(items, context("expected ']'", sym(true, "]")))),
                ),
                Expr::List,
            ),
            dict,
            map(strings(nested), Expr::Str),
            f_string,
            number,
            name_or_literal,
        )),
    )(i)
}

/// Comma separated expressions, trailing comma allowed
fn items(i: &str) -> PResult<'_, Vec<Expr>> {
    terminated(
        separated_list0(sym(true, ","), |i| expression(i, true)),
        opt(sym(true, ",")),
    )(i)
}

/// `(expr)`, or a tuple read as a list
fn group(i: &str) -> PResult<'_, Expr> {
    let (i, (mut items, trailing)) = delimited(
        char('('),
        cut(pair(
            separated_list0(sym(true, ","), |i| expression(i, true)),
            opt(sym(true, ",")),
        )),
        context("expected ')'", cut(sym(true, ")"))),
    )(i)?;
    let expr = match (items.len(), trailing) {
        (1, None) => items.remove(0),
        _ => Expr::List(items),
    };
    Ok((i, expr))
}

fn dict(i: &str) -> PResult<'_, Expr> {
    let entry = separated_pair(
        |i| expression(i, true),
        context("expected ':'", sym(true, ":")),
        cut(|i| expression(i, true)),
    );
    map(
        preceded(
            char('{'),
            cut(terminated(
                terminated(separated_list0(sym(true, ","), entry), opt(sym(true, ","))),
                context("expected '}'", sym(true, "}")),
            )),
        ),
        Expr::Dict,
    )(i)
}

/// Adjacent string literals concatenate
fn strings<'a>(nested: bool) -> impl FnMut(&'a str) -> PResult<'a, String> {
    map(
        pair(string_literal, many0(preceded(blank(nested), string_literal))),
        |(first, rest)| {
            rest.into_iter().fold(first, |mut s, next| {
                s.push_str(&next);
                s
            })
        },
    )
}

/// Raw and byte prefixes are accepted and read as plain strings
fn string_literal(i: &str) -> PResult<'_, String> {
    preceded(opt(one_of("rb")), alt((quoted('"'), quoted('\''))))(i)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> PResult<'a, String> {
    preceded(
        char(quote),
        cut(terminated(
            fold_many0(
                alt((
                    preceded(char('\\'), map(anychar, unescape)),
                    satisfy(move |c: char| c != quote && c != '\\'),
                )),
                String::new,
                |mut s, c| {
                    s.push(c);
                    s
                },
            ),
            context("unterminated string", char(quote)),
        )),
    )
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        other => other,
    }
}

fn f_string(i: &str) -> PResult<'_, Expr> {
    let prefix: PResult<'_, (char, char)> = pair(one_of("fF"), one_of("\"'"))(i);
    prefix?;
    fail_with(i, F_STRINGS)
}

fn digits(i: &str) -> PResult<'_, &str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == '_')))(i)
}

fn exponent(i: &str) -> PResult<'_, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(i)
}

fn float_literal(i: &str) -> PResult<'_, &str> {
    alt((
        recognize(tuple((
            digits,
            char('.'),
            opt(digits),
            opt(exponent),
            not(satisfy(is_ident_start)),
        ))),
        recognize(tuple((char('.'), digits, opt(exponent)))),
        recognize(pair(digits, exponent)),
    ))(i)
}

fn number(i: &str) -> PResult<'_, Expr> {
    if let Ok((rest, text)) = float_literal(i) {
        return match text.replace('_', "").parse::<f64>() {
            Ok(f) => Ok((rest, Expr::Float(f))),
            Err(_) => fail_with(i, BAD_NUMBER),
        };
    }
    let (rest, text) = digits(i)?;
    match text.replace('_', "").parse::<i64>() {
        Ok(n) => Ok((rest, Expr::Int(n))),
        Err(_) => fail_with(i, BAD_NUMBER),
    }
}

fn name_or_literal(i: &str) -> PResult<'_, Expr> {
    let (rest, word) = identifier(i)?;
    let expr = match word {
        "True" | "true" => Expr::Bool(true),
        "False" | "false" => Expr::Bool(false),
        "None" | "null" => Expr::None,
        w if RESERVED.contains(&w) => {
            return Err(nom::Err::Error(VerboseError::from_error_kind(
                i,
                ErrorKind::Tag,
            )))
        }
        w => Expr::Name(w.to_string()),
    };
    Ok((rest, expr))
}

// ── Error reporting ─────────────────────────────────────────────

fn line_at(src: &str, rest: &str) -> usize {
    let consumed = src.len().saturating_sub(rest.len());
    src.get(..consumed)
        .map_or(1, |done| done.matches('\n').count() + 1)
}

/// The word or symbol at the start of `at`
fn token(at: &str) -> &str {
    let at = at.trim_start_matches([' ', '\t', '\r']);
    let end = at
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map_or(at.len(), |(idx, _)| idx);
    if end > 0 {
        &at[..end]
    } else {
        at.chars().next().map_or("", |c| &at[..c.len_utf8()])
    }
}

fn unexpected(at: &str) -> String {
    match token(at) {
        "" => "unexpected end of input".to_string(),
        "\n" | ";" => "unexpected end of line".to_string(),
        tok => format!("unexpected '{}'", tok),
    }
}

fn syntax_error(src: &str, err: VerboseError<&str>) -> Error {
    let labelled = err.errors.iter().find_map(|(at, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some((*at, *ctx)),
        _ => None,
    });
    let (at, message) = match labelled {
        Some((at, UNSUPPORTED)) => (at, format!("'{}' {}", token(at), UNSUPPORTED)),
        Some((at, BAD_NUMBER)) => (at, format!("{} '{}'", BAD_NUMBER, token(at))),
        Some((at, ctx)) => (at, ctx.to_string()),
        None => {
            let at = err.errors.first().map_or("", |(at, _)| *at);
            (at, unexpected(at))
        }
    };
    syntax(line_at(src, at), &message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        match parse(src).unwrap().remove(0) {
            Stmt::Expr { expr, .. } => expr,
            other => panic!("not an expression: {:?}", other),
        }
    }

    fn error(src: &str) -> String {
        parse(src).unwrap_err().to_string()
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            expr("a + b * c"),
            Expr::Binary(
                BinOp::Add,
                name("a"),
                Box::new(Expr::Binary(BinOp::Mul, name("b"), name("c")))
            )
        );
        assert_eq!(
            expr("-a ** 2"),
            Expr::Unary(
                UnOp::Neg,
                Box::new(Expr::Binary(BinOp::Pow, name("a"), Box::new(Expr::Int(2))))
            )
        );
        assert_eq!(
            expr("a - b - c"),
            Expr::Binary(
                BinOp::Sub,
                Box::new(Expr::Binary(BinOp::Sub, name("a"), name("b"))),
                name("c")
            )
        );
        assert!(matches!(expr("not a == b"), Expr::Unary(UnOp::Not, _)));
        assert!(matches!(expr("x if a and b else y"), Expr::IfElse(..)));
    }

    #[test]
    fn test_statements_and_lines() {
        let stmts = parse("x = 1; y = 2\n\n# note\ndf['z'] = x\nlen(df)").unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(matches!(&stmts[0], Stmt::Assign { target: Target::Name(n), line: 1, .. } if n == "x"));
        assert!(matches!(&stmts[1], Stmt::Assign { line: 1, .. }));
        assert!(matches!(&stmts[2], Stmt::Assign { target: Target::Index { .. }, line: 4, .. }));
        assert!(matches!(&stmts[3], Stmt::Expr { line: 5, .. }));
    }

    #[test]
    fn test_brackets_span_lines() {
        let stmts = parse("result = f(\n    a,\n    key='v',\n)\nz = [1,\n 2]").unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0] {
            Stmt::Assign {
                value: Expr::Call(_, args),
                ..
            } => {
                assert_eq!(args.len(), 2);
                assert_eq!(args[1].name.as_deref(), Some("key"));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
        assert!(matches!(&stmts[1], Stmt::Assign { line: 5, .. }));
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr("1_000"), Expr::Int(1000));
        assert_eq!(expr("2.5e1"), Expr::Float(25.0));
        assert_eq!(expr(".5"), Expr::Float(0.5));
        assert_eq!(expr("'a' \"b\""), Expr::Str("ab".to_string()));
        assert_eq!(expr("'it\\'s\\n'"), Expr::Str("it's\n".to_string()));
        assert_eq!(expr("r'raw'"), Expr::Str("raw".to_string()));
        assert_eq!(expr("(1,)"), Expr::List(vec![Expr::Int(1)]));
        assert_eq!(expr("()"), Expr::List(vec![]));
        assert_eq!(expr("None"), Expr::None);
        assert!(matches!(expr("{'a': 1, 'b': [2, 3],}"), Expr::Dict(entries) if entries.len() == 2));
    }

    #[test]
    fn test_method_chain() {
        assert_eq!(
            expr("df.head(2)['a']"),
            Expr::Index(
                Box::new(Expr::Call(
                    Box::new(Expr::Attr(name("df"), "head".to_string())),
                    vec![Arg {
                        name: None,
                        value: Expr::Int(2)
                    }]
                )),
                Box::new(Expr::Str("a".to_string()))
            )
        );
    }

    #[test]
    fn test_rejected_constructs() {
        assert!(error("import os").contains("imports are not available"));
        assert!(error("for x in df:\n    pass").contains("'for' is not supported"));
        assert!(error("x = f'{y}'").contains("f-strings are not supported"));
        assert!(error("f(a=1, 2)").contains("positional argument follows keyword argument"));
        assert!(error("f(x) = 1").contains("can only assign to a name"));
        assert!(error("x = lambda: 1").contains("syntax error"));
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(error("x = 1\ny = (1 + "), "Code execution failed: syntax error on line 2: unexpected end of input");
        assert!(error("x = 'open").contains("unterminated string"));
        assert!(error("x = 1 2").contains("unexpected '2'"));
        assert!(error("x = [1,\n2\ny = 3").contains("expected ']'"));
        assert!(error("x = 99999999999999999999").contains("invalid number '99999999999999999999'"));
        assert!(error("x = (a if b)").contains("expected 'else'"));
    }
}
