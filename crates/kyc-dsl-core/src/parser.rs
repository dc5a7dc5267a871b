//! S-expression parser for the KYC case DSL.
//!
//! Tokens are `(`, `)`, bare identifiers, and double-quoted strings (outer
//! quotes stripped, no escape processing). Line comments start with `;` or
//! `#`. The top level is a sequence of `(kyc-case NAME body…)` forms; any
//! other top-level form is a parse error.

use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, multispace1},
    combinator::{cut, map},
    error::{context, convert_error, ContextError, ParseError as NomParseError, VerboseError},
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};
use thiserror::Error;

use crate::ast::{CaseExpr, Expr};

/// DSL syntax violations, with line context where available.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("line {line}: expected (kyc-case ...) at top level, found '{found}'")]
    UnexpectedForm { found: String, line: usize },

    #[error("line {line}: kyc-case requires a name")]
    MissingCaseName { line: usize },
}

/// A parsed DSL source: zero or more `kyc-case` forms in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dsl {
    pub cases: Vec<CaseExpr>,
}

/// Parse a complete DSL source into its `kyc-case` forms.
pub fn parse(input: &str) -> Result<Dsl, ParseError> {
    let mut rest = skip_trivia(input);
    let mut cases = Vec::new();

    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        let line = line_of(input, offset);

        let (after, form) = expr::<VerboseError<&str>>(rest)
            .map_err(|e| syntax_error(input, e))?;

        match form {
            Expr::Call(head, args) if head == "kyc-case" => {
                let name = match args.first().and_then(Expr::as_atom) {
                    Some(name) => name.to_string(),
                    None => return Err(ParseError::MissingCaseName { line }),
                };
                cases.push(CaseExpr {
                    name,
                    body: args.into_iter().skip(1).collect(),
                    line,
                });
            }
            Expr::Call(head, _) => {
                return Err(ParseError::UnexpectedForm { found: head, line });
            }
            Expr::Atom(atom) => {
                return Err(ParseError::UnexpectedForm { found: atom, line });
            }
        }

        rest = skip_trivia(after);
    }

    Ok(Dsl { cases })
}

fn syntax_error(input: &str, err: nom::Err<VerboseError<&str>>) -> ParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            ParseError::Syntax(convert_error(input, e))
        }
        nom::Err::Incomplete(_) => ParseError::Syntax("incomplete input".to_string()),
    }
}

/// 1-based line number of a byte offset.
fn line_of(input: &str, offset: usize) -> usize {
    input[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

// ============================================================================
// Token-level parsers
// ============================================================================

/// Consume whitespace and line comments. Never fails.
fn skip_trivia(input: &str) -> &str {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with(';') || trimmed.starts_with('#') {
            rest = match trimmed.find('\n') {
                Some(idx) => &trimmed[idx + 1..],
                None => "",
            };
        } else if trimmed.len() != rest.len() {
            rest = trimmed;
        } else {
            return rest;
        }
    }
}

fn trivia<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    let (rest, _) = many0(alt((
        map(multispace1, |_| ()),
        map(
            preceded(alt((char(';'), char('#'))), take_while(|c| c != '\n')),
            |_| (),
        ),
    )))(input)?;
    Ok((rest, ()))
}

fn identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    nom::bytes::complete::take_while1(|c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '%')
    })(input)
}

fn quoted<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    delimited(char('"'), take_while(|c| c != '"'), char('"'))(input)
}

fn atom<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    alt((
        map(quoted, |s: &str| Expr::Atom(s.to_string())),
        map(identifier, |s: &str| Expr::Atom(s.to_string())),
    ))(input)
}

fn sexpr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Expr, E> {
    let (input, _) = char('(')(input)?;
    let (input, _) = trivia(input)?;
    let (input, head) = context("form head", identifier)(input)?;
    let (input, args) = many0(expr)(input)?;
    let (input, _) = trivia(input)?;
    let (input, _) = cut(context("closing parenthesis", char(')')))(input)?;
    Ok((input, Expr::Call(head.to_string(), args)))
}

fn expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Expr, E> {
    preceded(trivia, alt((sexpr, atom)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_case() {
        let dsl = parse("(kyc-case TEST)").unwrap();
        assert_eq!(dsl.cases.len(), 1);
        assert_eq!(dsl.cases[0].name, "TEST");
        assert!(dsl.cases[0].body.is_empty());
    }

    #[test]
    fn parses_nested_sections() {
        let src = r#"(kyc-case TEST
            (nature-purpose (nature "Corporate Banking") (purpose "Custody"))
            (client-business-unit ACME-LUX)
            (kyc-token "pending"))"#;
        let dsl = parse(src).unwrap();
        let body = &dsl.cases[0].body;
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].head(), Some("nature-purpose"));
        assert_eq!(body[0].args()[0].args()[0].as_atom(), Some("Corporate Banking"));
        assert_eq!(body[2].args()[0].as_atom(), Some("pending"));
    }

    #[test]
    fn strips_comments() {
        let src = "; header comment\n(kyc-case TEST) # trailing\n# footer";
        let dsl = parse(src).unwrap();
        assert_eq!(dsl.cases.len(), 1);
    }

    #[test]
    fn percent_atoms_survive() {
        let src = "(kyc-case T (ownership-structure (owner ACME 45.5%)))";
        let dsl = parse(src).unwrap();
        let owner = &dsl.cases[0].body[0].args()[0];
        assert_eq!(owner.args()[1].as_atom(), Some("45.5%"));
    }

    #[test]
    fn rejects_unexpected_top_level_form() {
        let err = parse("(kyc-case A)\n\n(something-else B)").unwrap_err();
        match err {
            ParseError::UnexpectedForm { found, line } => {
                assert_eq!(found, "something-else");
                assert_eq!(line, 3);
            }
            other => panic!("expected UnexpectedForm, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unclosed_paren() {
        let err = parse("(kyc-case TEST (policy POL-1").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
    }

    #[test]
    fn rejects_missing_case_name() {
        let err = parse("(kyc-case)").unwrap_err();
        assert!(matches!(err, ParseError::MissingCaseName { line: 1 }));
    }

    #[test]
    fn parses_multiple_cases() {
        let dsl = parse("(kyc-case A)\n\n\n(kyc-case B)").unwrap();
        let names: Vec<_> = dsl.cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn empty_source_yields_no_cases() {
        assert!(parse("  ; nothing here\n").unwrap().cases.is_empty());
    }
}
