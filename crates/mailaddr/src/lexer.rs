use crate::{AddressError, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Scalars permitted in a dot-atom, per RFC 5322 atext.
pub(crate) fn is_atom_scalar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

/// Scalars permitted unescaped inside a quoted string, beyond atext.
fn is_quote_only_scalar(c: char) -> bool {
    ". (),:;<>@[]".contains(c)
}

/// Scalars permitted after a backslash inside a quoted string.
fn is_escapable_scalar(c: char) -> bool {
    c == ' ' || c == '\t' || ('\x21'..='\x7e').contains(&c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpLiteral {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl std::fmt::Display for IpLiteral {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::V4(a) => write!(fmt, "[{a}]"),
            Self::V6(a) => write!(fmt, "[IPv6:{a}]"),
        }
    }
}

/// The flat token stream produced by the first stage.
/// Comments are not consumed here; the parens become structure in the
/// preparser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailToken {
    OpenComment,
    CloseComment,
    Dot,
    AtSign,
    Ip(IpLiteral),
    Plain(String),
    /// Content with escapes resolved; the surrounding quotes and any
    /// backslashes are not part of the value.
    Quoted(String),
}

pub fn lex(input: &str) -> Result<Vec<MailToken>> {
    let mut tokens = vec![];
    let mut run = String::new();
    let mut chars = input.chars().peekable();

    fn flush(run: &mut String, tokens: &mut Vec<MailToken>) {
        if !run.is_empty() {
            tokens.push(MailToken::Plain(std::mem::take(run)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '(' => {
                flush(&mut run, &mut tokens);
                tokens.push(MailToken::OpenComment);
            }
            ')' => {
                flush(&mut run, &mut tokens);
                tokens.push(MailToken::CloseComment);
            }
            '.' => {
                flush(&mut run, &mut tokens);
                tokens.push(MailToken::Dot);
            }
            '@' => {
                flush(&mut run, &mut tokens);
                tokens.push(MailToken::AtSign);
            }
            '"' => {
                flush(&mut run, &mut tokens);
                tokens.push(lex_quoted(&mut chars)?);
            }
            '[' => {
                flush(&mut run, &mut tokens);
                tokens.push(lex_ip_literal(&mut chars)?);
            }
            _ => run.push(c),
        }
    }
    flush(&mut run, &mut tokens);

    Ok(tokens)
}

fn lex_quoted(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<MailToken> {
    let mut content = String::new();
    loop {
        match chars.next() {
            None => return Err(AddressError::UnterminatedQuotedString),
            Some('"') => return Ok(MailToken::Quoted(content)),
            Some('\\') => match chars.next() {
                None => return Err(AddressError::UnterminatedQuotedString),
                Some(esc) if is_escapable_scalar(esc) => content.push(esc),
                Some(_) => return Err(AddressError::InvalidScalarInQuotedString),
            },
            Some(c) if is_atom_scalar(c) || is_quote_only_scalar(c) => content.push(c),
            Some(_) => return Err(AddressError::InvalidScalarInQuotedString),
        }
    }
}

fn lex_ip_literal(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<MailToken> {
    let mut interior = String::new();
    loop {
        match chars.next() {
            None => return Err(AddressError::UnterminatedIpAddressLiteral),
            Some(']') => break,
            Some(c) => interior.push(c),
        }
    }

    // The IPv6 tag is the only non-address text permitted inside the
    // brackets; everything else must be address scalars.
    let (body, v6) = match interior.strip_prefix("IPv6:") {
        Some(body) => (body, true),
        None => (interior.as_str(), false),
    };

    if !body
        .chars()
        .all(|c| c.is_ascii_hexdigit() || c == '.' || c == ':')
    {
        return Err(AddressError::InvalidScalarInIpAddressLiteral);
    }

    let ip = if v6 {
        IpLiteral::V6(Ipv6Addr::from_str(body).map_err(|_| AddressError::InvalidIpAddressLiteral)?)
    } else {
        IpLiteral::V4(Ipv4Addr::from_str(body).map_err(|_| AddressError::InvalidIpAddressLiteral)?)
    };
    Ok(MailToken::Ip(ip))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_runs_coalesce() {
        k9::snapshot!(
            lex("foo.bar@example.com").unwrap(),
            r#"
[
    Plain(
        "foo",
    ),
    Dot,
    Plain(
        "bar",
    ),
    AtSign,
    Plain(
        "example",
    ),
    Dot,
    Plain(
        "com",
    ),
]
"#
        );
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(
            lex("\"john smith\"@x").unwrap()[0],
            MailToken::Quoted("john smith".to_string())
        );
        assert_eq!(
            lex("\"a\\\"b\"@x").unwrap()[0],
            MailToken::Quoted("a\"b".to_string())
        );
        assert_eq!(lex("\"oops@x"), Err(AddressError::UnterminatedQuotedString));
        assert_eq!(
            lex("\"bell\u{7}\"@x"),
            Err(AddressError::InvalidScalarInQuotedString)
        );
        assert_eq!(
            lex("\"bad\\\u{7}\"@x"),
            Err(AddressError::InvalidScalarInQuotedString)
        );
    }

    #[test]
    fn ip_literals() {
        assert_eq!(
            lex("a@[127.0.0.1]").unwrap()[2],
            MailToken::Ip(IpLiteral::V4("127.0.0.1".parse().unwrap()))
        );
        assert_eq!(
            lex("a@[IPv6:::1]").unwrap()[2],
            MailToken::Ip(IpLiteral::V6("::1".parse().unwrap()))
        );
        // v6 syntax without the tag is not accepted as v4
        assert_eq!(lex("a@[::1]"), Err(AddressError::InvalidIpAddressLiteral));
        assert_eq!(
            lex("a@[127.0.0.1"),
            Err(AddressError::UnterminatedIpAddressLiteral)
        );
        assert_eq!(
            lex("a@[127.0.0.z]"),
            Err(AddressError::InvalidScalarInIpAddressLiteral)
        );
        assert_eq!(
            lex("a@[999.0.0.1]"),
            Err(AddressError::InvalidIpAddressLiteral)
        );
    }

    #[test]
    fn ip_literal_display() {
        assert_eq!(
            IpLiteral::V4("10.0.0.1".parse().unwrap()).to_string(),
            "[10.0.0.1]"
        );
        assert_eq!(
            IpLiteral::V6("2001:db8::1".parse().unwrap()).to_string(),
            "[IPv6:2001:db8::1]"
        );
    }

    #[test]
    fn comment_parens_are_tokens() {
        k9::snapshot!(
            lex("(hi)a@b").unwrap(),
            r#"
[
    OpenComment,
    Plain(
        "hi",
    ),
    CloseComment,
    Plain(
        "a",
    ),
    AtSign,
    Plain(
        "b",
    ),
]
"#
        );
    }
}
