//! Whitespace and comment parsing.

use nom::{
    branch::alt,
    character::complete::{char, multispace1, not_line_ending},
    combinator::{map, recognize},
    multi::many0,
    sequence::pair,
    IResult,
};

/// Whitespace and `;` line comments - returns the matched string
pub(crate) fn blank_space(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        map(multispace1, |_| ()),
        map(pair(char(';'), not_line_ending), |_| ()),
    ))))(input)
}

/// Skip whitespace and comments
pub(crate) fn blank(input: &str) -> IResult<&str, ()> {
    map(blank_space, |_| ())(input)
}
