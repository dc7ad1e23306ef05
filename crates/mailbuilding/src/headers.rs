use crate::address::{Mailbox, MailboxList};
use crate::charsets::CharsetEncoder;
use crate::content_id::ContentId;
use crate::rfc2047::encode_header_value;
use crate::{MailBuildError, Result};
use chrono::{DateTime, FixedOffset};

/// These two are derived from the body at assembly time; storing them
/// here would let a caller contradict the content.
const RESERVED_NAMES: &[&str] = &["Content-Type", "Content-Transfer-Encoding"];

/// The fixed front of the emission order; everything else follows
/// sorted by name.
const ORDERED_NAMES: &[&str] = &[
    "From",
    "To",
    "Cc",
    "Bcc",
    "Subject",
    "MIME-Version",
    "X-Mailer",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Mailbox(Mailbox),
    MailboxList(MailboxList),
    Text(String),
    MessageId(ContentId),
    Date(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderField {
    /// Spelling as the caller provided it; lookups are
    /// case-insensitive.
    name: String,
    value: HeaderValue,
}

/// The storable header fields of a message, in insertion order, with
/// deterministic emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<HeaderField>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: HeaderValue) -> Result<()> {
        let name = name.into();
        if RESERVED_NAMES
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&name))
        {
            return Err(MailBuildError::ReservedHeaderName(name));
        }
        match self
            .fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(&name))
        {
            Some(i) => self.fields[i].value = value,
            None => self.fields.push(HeaderField { name, value }),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| &f.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    pub fn set_author(&mut self, mailbox: Mailbox) {
        self.set_infallible("From", HeaderValue::Mailbox(mailbox));
    }

    pub fn set_sender(&mut self, mailbox: Mailbox) {
        self.set_infallible("Sender", HeaderValue::Mailbox(mailbox));
    }

    pub fn set_reply_to(&mut self, list: MailboxList) {
        self.set_infallible("Reply-To", HeaderValue::MailboxList(list));
    }

    pub fn set_to(&mut self, list: MailboxList) {
        self.set_infallible("To", HeaderValue::MailboxList(list));
    }

    pub fn set_cc(&mut self, list: MailboxList) {
        self.set_infallible("Cc", HeaderValue::MailboxList(list));
    }

    pub fn set_bcc(&mut self, list: MailboxList) {
        self.set_infallible("Bcc", HeaderValue::MailboxList(list));
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.set_infallible("Subject", HeaderValue::Text(subject.into()));
    }

    pub fn set_x_mailer(&mut self, mailer: impl Into<String>) {
        self.set_infallible("X-Mailer", HeaderValue::Text(mailer.into()));
    }

    pub fn set_in_reply_to(&mut self, id: ContentId) {
        self.set_infallible("In-Reply-To", HeaderValue::MessageId(id));
    }

    pub fn set_date(&mut self, date: DateTime<FixedOffset>) {
        self.set_infallible("Date", HeaderValue::Date(date));
    }

    fn set_infallible(&mut self, name: &str, value: HeaderValue) {
        // only reserved names can fail, and none of the typed setters
        // use one
        let _ = self.set(name, value);
    }

    pub fn author(&self) -> Option<&Mailbox> {
        match self.get("From") {
            Some(HeaderValue::Mailbox(mb)) => Some(mb),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        match self.get("Subject") {
            Some(HeaderValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn has_recipients(&self) -> bool {
        ["To", "Cc", "Bcc"].iter().any(|name| match self.get(name) {
            Some(HeaderValue::MailboxList(list)) => !list.is_empty(),
            Some(_) => true,
            None => false,
        })
    }

    /// Emission order: the fixed prefix, then everything else sorted by
    /// name.
    fn ordered(&self) -> Vec<&HeaderField> {
        let mut ordered: Vec<&HeaderField> = vec![];
        for name in ORDERED_NAMES {
            if let Some(field) = self
                .fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
            {
                ordered.push(field);
            }
        }
        let mut rest: Vec<&HeaderField> = self
            .fields
            .iter()
            .filter(|f| {
                !ORDERED_NAMES
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&f.name))
            })
            .collect();
        rest.sort_by(|a, b| {
            a.name
                .to_ascii_lowercase()
                .cmp(&b.name.to_ascii_lowercase())
        });
        ordered.extend(rest);
        ordered
    }

    /// Render every stored field as folded `Name: value CRLF` lines.
    pub(crate) fn write_fields(&self, charset: &CharsetEncoder, out: &mut String) -> Result<()> {
        for field in self.ordered() {
            let used = field.name.len() + 2;
            let value = match &field.value {
                HeaderValue::Mailbox(mb) => mb.encode_value(used, charset)?,
                HeaderValue::MailboxList(list) => list.encode_value(used, charset)?,
                HeaderValue::Text(text) => encode_header_value(used, text, charset)?,
                HeaderValue::MessageId(id) => id.to_string(),
                HeaderValue::Date(date) => date.to_rfc2822(),
            };
            out.push_str(&field.name);
            out.push_str(": ");
            out.push_str(&value);
            out.push_str("\r\n");
        }
        Ok(())
    }
}
