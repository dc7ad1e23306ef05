use crate::domain::Domain;
use crate::lexer::{is_atom_scalar, lex, IpLiteral};
use crate::preparser::{preparse, quoted_surface, MailNode};
use crate::{AddressError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The domain side of an address: either a host name or a bracketed
/// address literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomainPart {
    Name(Domain),
    Ip(IpLiteral),
}

impl std::fmt::Display for DomainPart {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Name(d) => d.fmt(fmt),
            Self::Ip(ip) => ip.fmt(fmt),
        }
    }
}

/// A structurally valid RFC 5321 mail address.
///
/// `local_part` holds the canonical surface form: dot-atoms stay bare,
/// and quoted strings keep their quotes (re-escaped) unless their
/// content is dot-atom safe, in which case they are normalized to the
/// bare form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MailAddress {
    local_part: String,
    domain: DomainPart,
}

impl MailAddress {
    /// Precise form: the variant names which rule rejected the input.
    pub fn parse(text: &str) -> Result<Self> {
        if text.chars().count() >= 255 {
            return Err(AddressError::TooLong);
        }

        let nodes = preparse(lex(text)?)?;

        let at_count = nodes
            .iter()
            .filter(|n| matches!(n, MailNode::AtSign))
            .count();
        if at_count == 0 {
            return Err(AddressError::MissingAtSign);
        }
        if at_count > 1 {
            return Err(AddressError::DuplicateAtSigns);
        }
        let at = nodes
            .iter()
            .position(|n| matches!(n, MailNode::AtSign))
            .ok_or(AddressError::MissingAtSign)?;

        let local_nodes = strip_comments(&nodes[..at])?;
        let domain_nodes = strip_comments(&nodes[at + 1..])?;
        if local_nodes.is_empty() {
            return Err(AddressError::MissingLocalPart);
        }
        if domain_nodes.is_empty() {
            return Err(AddressError::MissingDomain);
        }

        let local_part = parse_local(local_nodes)?;
        let domain = parse_domain(domain_nodes)?;

        Ok(Self { local_part, domain })
    }

    /// Best-effort form: absent on any parse error.
    pub fn try_new(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn domain_part(&self) -> &DomainPart {
        &self.domain
    }
}

impl FromStr for MailAddress {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MailAddress {
    type Error = AddressError;
    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<MailAddress> for String {
    fn from(a: MailAddress) -> String {
        a.to_string()
    }
}

impl std::fmt::Display for MailAddress {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}@{}", self.local_part, self.domain)
    }
}

/// Drop leading and trailing comment nodes; any comment left after that
/// is mid-stream and rejected.
fn strip_comments(nodes: &[MailNode]) -> Result<&[MailNode]> {
    let mut nodes = nodes;
    while matches!(nodes.first(), Some(MailNode::Comment(_))) {
        nodes = &nodes[1..];
    }
    while matches!(nodes.last(), Some(MailNode::Comment(_))) {
        nodes = &nodes[..nodes.len() - 1];
    }
    if nodes.iter().any(|n| matches!(n, MailNode::Comment(_))) {
        return Err(AddressError::InvalidCommentPosition);
    }
    Ok(nodes)
}

fn parse_domain(nodes: &[MailNode]) -> Result<DomainPart> {
    match nodes {
        [MailNode::Ip(ip)] => Ok(DomainPart::Ip(*ip)),
        [MailNode::Plain(s)] => Ok(DomainPart::Name(s.parse()?)),
        _ => {
            // A dotted sequence of name labels; anything else in domain
            // position is malformed.
            let mut text = String::new();
            let mut last_was_dot = false;
            for node in nodes {
                match node {
                    MailNode::Plain(s) => {
                        text.push_str(s);
                        last_was_dot = false;
                    }
                    MailNode::Dot => {
                        if last_was_dot {
                            return Err(AddressError::ConsecutiveDots);
                        }
                        text.push('.');
                        last_was_dot = true;
                    }
                    _ => return Err(AddressError::InvalidDomain),
                }
            }
            Ok(DomainPart::Name(text.parse()?))
        }
    }
}

fn parse_local(nodes: &[MailNode]) -> Result<String> {
    if matches!(nodes.first(), Some(MailNode::Dot))
        || matches!(nodes.last(), Some(MailNode::Dot))
    {
        return Err(AddressError::InvalidDotPosition);
    }

    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        match node {
            MailNode::Dot => {
                if matches!(nodes.get(i + 1), Some(MailNode::Dot)) {
                    return Err(AddressError::ConsecutiveDots);
                }
                out.push('.');
            }
            MailNode::Ip(_) => return Err(AddressError::InvalidScalarInLocalPart),
            MailNode::Plain(s) => {
                if !s.chars().all(is_atom_scalar) {
                    return Err(AddressError::InvalidScalarInLocalPart);
                }
                out.push_str(s);
            }
            MailNode::Quoted(content) => {
                let prev_ok = i == 0 || matches!(nodes[i - 1], MailNode::Dot);
                let next_ok = i + 1 == nodes.len() || matches!(nodes[i + 1], MailNode::Dot);
                if !prev_ok || !next_ok {
                    return Err(AddressError::InvalidQuotedStringPosition);
                }
                if !content.is_empty() && content.chars().all(is_atom_scalar) {
                    out.push_str(content);
                } else {
                    out.push_str(&quoted_surface(content));
                }
            }
            MailNode::Comment(_) | MailNode::AtSign => unreachable!(),
        }
    }

    if out.chars().count() >= 65 {
        return Err(AddressError::TooLongLocalPart);
    }
    Ok(out)
}
