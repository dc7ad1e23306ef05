use crate::charsets::CharsetEncoder;
use crate::rfc2047::encode_header_value;
use crate::Result;
use mailaddr::MailAddress;

fn is_phrase_atom(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

/// An optional display name plus a mail address. Serializes as `addr`
/// or `display <addr>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: MailAddress,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: MailAddress) -> Self {
        Self {
            name: Some(name.into()),
            address,
        }
    }

    pub fn address_only(address: MailAddress) -> Self {
        Self {
            name: None,
            address,
        }
    }

    /// Header-value form. ASCII atom phrases stay bare, other ASCII
    /// names are quoted, and anything beyond ASCII goes through the
    /// encoded-word writer.
    pub(crate) fn encode_value(
        &self,
        first_line_used: usize,
        charset: &CharsetEncoder,
    ) -> Result<String> {
        let addr = self.address.to_string();
        match &self.name {
            None => Ok(addr),
            Some(name) => {
                let display = encode_display_name(first_line_used, name, charset)?;
                // keep the angle-addr on the display name's final line
                // unless that would blow the budget
                let last_line = display.rsplit("\r\n ").next().unwrap_or("");
                let used = if display.contains("\r\n ") {
                    last_line.len()
                } else {
                    first_line_used + last_line.len()
                };
                if used + 1 + addr.len() + 2 > 75 {
                    Ok(format!("{display}\r\n <{addr}>"))
                } else {
                    Ok(format!("{display} <{addr}>"))
                }
            }
        }
    }
}

fn encode_display_name(
    first_line_used: usize,
    name: &str,
    charset: &CharsetEncoder,
) -> Result<String> {
    if !name.is_ascii() {
        return encode_header_value(first_line_used, name, charset);
    }
    let is_plain_phrase = !name.is_empty()
        && name
            .split(' ')
            .all(|word| !word.is_empty() && word.chars().all(is_phrase_atom));
    if is_plain_phrase {
        return Ok(name.to_string());
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Ok(quoted)
}

/// An ordered group of mailboxes, comma-joined with no space, the way
/// recipient fields are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailboxList(pub Vec<Mailbox>);

impl MailboxList {
    pub fn new(entries: Vec<Mailbox>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, mailbox: Mailbox) {
        self.0.push(mailbox);
    }

    pub(crate) fn encode_value(
        &self,
        first_line_used: usize,
        charset: &CharsetEncoder,
    ) -> Result<String> {
        let mut out = String::new();
        let mut line_used = first_line_used;
        for (i, mailbox) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
                line_used += 1;
            }
            let mut encoded = mailbox.encode_value(line_used, charset)?;
            let first = encoded.split("\r\n ").next().unwrap_or("");
            if i > 0 && line_used + first.len() > 75 {
                out.push_str("\r\n ");
                line_used = 0;
                encoded = mailbox.encode_value(0, charset)?;
            }
            out.push_str(&encoded);
            match encoded.rsplit("\r\n ").next() {
                Some(last) if encoded.contains("\r\n ") => line_used = last.len(),
                _ => line_used += encoded.len(),
            }
        }
        Ok(out)
    }
}

impl From<Mailbox> for MailboxList {
    fn from(mailbox: Mailbox) -> Self {
        Self(vec![mailbox])
    }
}

impl std::iter::FromIterator<Mailbox> for MailboxList {
    fn from_iter<I: IntoIterator<Item = Mailbox>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
