use crate::{MailBuildError, Result};

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

fn is_dot_atom_text(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(|run| !run.is_empty() && run.chars().all(is_atext))
}

/// dtext: VCHAR minus `[`, `]` and `\`.
fn is_no_fold_literal(s: &str) -> bool {
    s.len() >= 2
        && s.starts_with('[')
        && s.ends_with(']')
        && s[1..s.len() - 1]
            .chars()
            .all(|c| matches!(c, '\x21'..='\x7e') && !matches!(c, '[' | ']' | '\\'))
}

/// A `<left@right>` identifier, used for Content-ID and In-Reply-To
/// and referenced from HTML bodies via `cid:` URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    left: String,
    right: String,
}

impl ContentId {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Result<Self> {
        let left = left.into();
        let right = right.into();
        if !is_dot_atom_text(&left) {
            return Err(MailBuildError::InvalidContentId(
                "left side must be dot-atom text",
            ));
        }
        if !is_dot_atom_text(&right) && !is_no_fold_literal(&right) {
            return Err(MailBuildError::InvalidContentId(
                "right side must be dot-atom text or a bracketed literal",
            ));
        }
        Ok(Self { left, right })
    }

    /// Accepts `left@right` with or without the surrounding angle
    /// brackets.
    pub fn parse(text: &str) -> Result<Self> {
        let inner = match text.strip_prefix('<') {
            Some(rest) => rest
                .strip_suffix('>')
                .ok_or(MailBuildError::InvalidContentId("unbalanced angle brackets"))?,
            None => text,
        };
        let (left, right) = inner
            .split_once('@')
            .ok_or(MailBuildError::InvalidContentId("missing @ sign"))?;
        Self::new(left, right)
    }

    /// Best-effort form.
    pub fn try_new(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    /// The form HTML references: `cid:left@right`.
    pub fn cid_url(&self) -> String {
        format!("cid:{}@{}", self.left, self.right)
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "<{}@{}>", self.left, self.right)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn well_formed() {
        let id = ContentId::new("image001", "mailer.example.com").unwrap();
        assert_eq!(id.to_string(), "<image001@mailer.example.com>");
        assert_eq!(id.cid_url(), "cid:image001@mailer.example.com");
    }

    #[test]
    fn bracketed_right_side() {
        let id = ContentId::new("part.1", "[192.0.2.1]").unwrap();
        assert_eq!(id.to_string(), "<part.1@[192.0.2.1]>");
    }

    #[test]
    fn parse_forms() {
        assert_eq!(
            ContentId::parse("<a@b.example>").unwrap(),
            ContentId::new("a", "b.example").unwrap()
        );
        assert_eq!(
            ContentId::parse("a@b.example").unwrap(),
            ContentId::new("a", "b.example").unwrap()
        );
        assert!(ContentId::parse("<a@b.example").is_err());
        assert!(ContentId::parse("no-at-sign").is_err());
        assert!(ContentId::try_new("two words@example").is_none());
    }

    #[test]
    fn rejects_malformed_sides() {
        assert!(ContentId::new("", "b").is_err());
        assert!(ContentId::new("a..b", "c").is_err());
        assert!(ContentId::new("a", "bracket[").is_err());
        assert!(ContentId::new("a", "[back\\slash]").is_err());
        assert!(ContentId::new("sp ace", "b").is_err());
    }
}
