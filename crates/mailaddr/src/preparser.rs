use crate::lexer::{IpLiteral, MailToken};
use crate::{AddressError, Result};

/// Nodes after comment nesting has been resolved. Everything inside a
/// comment collapses to text, except nested comments, which keep their
/// structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailNode {
    Comment(Vec<CommentPart>),
    Dot,
    AtSign,
    Ip(IpLiteral),
    Plain(String),
    Quoted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentPart {
    Text(String),
    Comment(Vec<CommentPart>),
}

/// Render quoted-string content back to its surface form.
pub(crate) fn quoted_surface(content: &str) -> String {
    let mut s = String::with_capacity(content.len() + 2);
    s.push('"');
    for c in content.chars() {
        if c == '"' || c == '\\' {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('"');
    s
}

fn comment_text(token: &MailToken) -> String {
    match token {
        MailToken::Dot => ".".to_string(),
        MailToken::AtSign => "@".to_string(),
        MailToken::Ip(ip) => ip.to_string(),
        MailToken::Plain(s) => s.clone(),
        MailToken::Quoted(s) => quoted_surface(s),
        MailToken::OpenComment | MailToken::CloseComment => unreachable!(),
    }
}

pub fn preparse(tokens: Vec<MailToken>) -> Result<Vec<MailNode>> {
    let mut nodes = vec![];
    // Stack of partially built comment bodies; non-empty while inside
    // one or more comments.
    let mut stack: Vec<Vec<CommentPart>> = vec![];

    for token in tokens {
        match token {
            MailToken::OpenComment => stack.push(vec![]),
            MailToken::CloseComment => {
                let parts = stack.pop().ok_or(AddressError::UnbalancedParenthesis)?;
                match stack.last_mut() {
                    Some(parent) => parent.push(CommentPart::Comment(parts)),
                    None => nodes.push(MailNode::Comment(parts)),
                }
            }
            token => match stack.last_mut() {
                Some(parts) => {
                    let text = comment_text(&token);
                    if matches!(parts.last(), Some(CommentPart::Text(_))) {
                        match parts.last_mut() {
                            Some(CommentPart::Text(prev)) => prev.push_str(&text),
                            _ => unreachable!(),
                        }
                    } else {
                        parts.push(CommentPart::Text(text));
                    }
                }
                None => nodes.push(match token {
                    MailToken::Dot => MailNode::Dot,
                    MailToken::AtSign => MailNode::AtSign,
                    MailToken::Ip(ip) => MailNode::Ip(ip),
                    MailToken::Plain(s) => MailNode::Plain(s),
                    MailToken::Quoted(s) => MailNode::Quoted(s),
                    MailToken::OpenComment | MailToken::CloseComment => unreachable!(),
                }),
            },
        }
    }

    if !stack.is_empty() {
        return Err(AddressError::UnbalancedParenthesis);
    }
    Ok(nodes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::lex;

    fn run(s: &str) -> Result<Vec<MailNode>> {
        preparse(lex(s)?)
    }

    #[test]
    fn nests_comments() {
        k9::snapshot!(
            run("(outer (inner) tail)a@b").unwrap(),
            r#"
[
    Comment(
        [
            Text(
                "outer ",
            ),
            Comment(
                [
                    Text(
                        "inner",
                    ),
                ],
            ),
            Text(
                " tail",
            ),
        ],
    ),
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

    #[test]
    fn comment_contents_flatten_to_surface_text() {
        k9::snapshot!(
            run("(a.b@[127.0.0.1] \"q\")x@y").unwrap(),
            r#"
[
    Comment(
        [
            Text(
                "a.b@[127.0.0.1] \"q\"",
            ),
        ],
    ),
    Plain(
        "x",
    ),
    AtSign,
    Plain(
        "y",
    ),
]
"#
        );
    }

    #[test]
    fn unbalanced() {
        assert_eq!(run("(oops a@b"), Err(AddressError::UnbalancedParenthesis));
        assert_eq!(run("oops) a@b"), Err(AddressError::UnbalancedParenthesis));
        assert_eq!(run("((x) a@b"), Err(AddressError::UnbalancedParenthesis));
    }
}
