//! Generic s-expression layer of the text form.

use alloc::vec::Vec;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::map,
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};

use super::{error::offset, whitespace::blank};

/// An atom or a parenthesized list, tagged with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sexp<'a> {
    Atom { text: &'a str, position: usize },
    List { items: Vec<Sexp<'a>>, position: usize },
}

impl<'a> Sexp<'a> {
    pub fn position(&self) -> usize {
        match self {
            Sexp::Atom { position, .. } | Sexp::List { position, .. } => *position,
        }
    }

    pub fn as_atom(&self) -> Option<&'a str> {
        match self {
            Sexp::Atom { text, .. } => Some(text),
            Sexp::List { .. } => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp<'a>]> {
        match self {
            Sexp::List { items, .. } => Some(items),
            Sexp::Atom { .. } => None,
        }
    }

    /// Head atom of a list such as `(declare ...)`.
    pub fn head(&self) -> Option<&'a str> {
        self.as_list()?.first()?.as_atom()
    }
}

fn atom(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != ';')(input)
}

/// Parse one s-expression. `original` is the whole text, used for positions.
pub(crate) fn sexp<'a>(original: &'a str, input: &'a str) -> IResult<&'a str, Sexp<'a>> {
    let position = offset(original, input);
    alt((
        map(
            delimited(
                char('('),
                many0(preceded(blank, |i: &'a str| sexp(original, i))),
                preceded(blank, char(')')),
            ),
            move |items| Sexp::List { items, position },
        ),
        map(atom, move |text| Sexp::Atom { text, position }),
    ))(input)
}

/// Parse any number of s-expressions separated by blanks.
pub(crate) fn sexps<'a>(original: &'a str, input: &'a str) -> IResult<&'a str, Vec<Sexp<'a>>> {
    many0(preceded(blank, |i: &'a str| sexp(original, i)))(input)
}
