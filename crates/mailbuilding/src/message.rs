use crate::body::Body;
use crate::charsets::CharsetEncoder;
use crate::fragment::{BoxFragmentIterator, ConstBuf, FragmentIterator, SequenceStream};
use crate::headers::{Header, HeaderValue};
use crate::{MailBuildError, Result};
use data_encoding::BASE64;

/// A complete deliverable message: stored header fields plus a body
/// tree. Assembly emits the ordered header block, the derived content
/// headers, a blank line, then the body fragment stream.
pub struct MailMessage {
    header: Header,
    body: Body,
    charset: CharsetEncoder,
}

impl MailMessage {
    pub fn new(header: Header, body: Body) -> Self {
        Self {
            header,
            body,
            charset: CharsetEncoder::utf8(),
        }
    }

    /// Charset used for header encoded-words.
    pub fn with_header_charset(mut self, charset: CharsetEncoder) -> Self {
        self.charset = charset;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Turn the message into its fragment stream. The message is
    /// consumed: attachment byte sources are single-pass.
    pub fn assemble(mut self) -> Result<BoxFragmentIterator> {
        if !self.header.has_recipients() {
            return Err(MailBuildError::NoRecipients);
        }
        if !self.header.contains("MIME-Version") {
            self.header
                .set("MIME-Version", HeaderValue::Text("1.0".to_string()))?;
        }
        if !self.header.contains("Date") {
            self.header.set_date(chrono::Utc::now().fixed_offset());
        }
        tracing::trace!("assembling message");

        let mut head = String::new();
        self.header.write_fields(&self.charset, &mut head)?;
        head.push_str(&self.body.content_headers()?);
        head.push_str("\r\n");

        Ok(Box::new(SequenceStream::new(vec![
            Box::new(ConstBuf::from_ascii(&head)?),
            self.body.into_stream()?,
        ])))
    }

    /// Drain the assembled stream into a writer, returning the byte
    /// count.
    pub fn write_to<W: std::io::Write>(self, out: &mut W) -> Result<u64> {
        let mut stream = self.assemble()?;
        let mut total = 0u64;
        while let Some(frag) = stream.next_fragment()? {
            out.write_all(frag.as_bytes())
                .map_err(|_| MailBuildError::UnexpectedError)?;
            total += frag.len() as u64;
        }
        if total == 0 {
            return Err(MailBuildError::NoDataWrittenToStream);
        }
        Ok(total)
    }

    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut out = vec![];
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Package the whole message as base64, the form submission APIs
    /// take.
    pub fn to_base64(self) -> Result<String> {
        let bytes = self.to_bytes()?;
        Ok(BASE64.encode(&bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::address::{Mailbox, MailboxList};
    use crate::body::{Body, Boundary, FilePart, HtmlBody, MixedBody, RichTextBody, TextBody};
    use crate::content_id::ContentId;
    use crate::cte::ContentTransferEncoding;
    use chrono::DateTime;
    use mailaddr::MailAddress;
    use std::io::Cursor;

    fn mailbox(name: &str, addr: &str) -> Mailbox {
        Mailbox::new(name, MailAddress::parse(addr).unwrap())
    }

    fn pinned_date() -> DateTime<chrono::FixedOffset> {
        DateTime::parse_from_rfc2822("Tue, 1 Jul 2003 10:52:37 +0200").unwrap()
    }

    fn plain_jp_message() -> MailMessage {
        let mut header = Header::new();
        header.set_author(mailbox("Author", "author@example.com"));
        header.set_to(MailboxList::from(mailbox("Recipient", "recipient@example.com")));
        header.set_subject(
            "My First Mail Message. - \
             \u{79c1}\u{306e}\u{521d}\u{3081}\u{3066}\u{306e}\
             \u{30e1}\u{30fc}\u{30eb}\u{30e1}\u{30c3}\u{30bb}\u{30fc}\u{30b8} -",
        );
        header.set_date(pinned_date());
        let body = Body::Plain(TextBody::new(
            "Hello, World!\n\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}\u{3001}\
             \u{4e16}\u{754c}\u{ff01}",
            CharsetEncoder::iso_2022_jp(),
            ContentTransferEncoding::SevenBit,
        ));
        MailMessage::new(header, body).with_header_charset(CharsetEncoder::iso_2022_jp())
    }

    #[test]
    fn plain_iso_2022_jp_message() {
        let bytes = plain_jp_message().to_bytes().unwrap();
        assert!(bytes.iter().all(|&b| b <= 0x7f));
        let text = String::from_utf8(bytes).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();

        let names: Vec<&str> = head
            .split("\r\n")
            .filter(|line| !line.starts_with(' '))
            .map(|line| line.split(':').next().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "From",
                "To",
                "Subject",
                "MIME-Version",
                "Date",
                "Content-Type",
                "Content-Transfer-Encoding"
            ]
        );

        assert!(head.contains("From: Author <author@example.com>"));
        assert!(head.contains("To: Recipient <recipient@example.com>"));
        assert!(head.contains("Subject: My First Mail Message. - =?ISO-2022-JP?B?"));
        // the subject folds into a second encoded word on its own line
        assert!(head.contains("?=\r\n =?ISO-2022-JP?B?"));
        assert!(head.contains("Content-Type: text/plain; charset=iso-2022-jp"));
        assert!(head.contains("Content-Transfer-Encoding: 7bit"));
        for line in head.split("\r\n") {
            assert!(line.len() <= 76, "{} bytes: {line}", line.len());
        }

        assert!(body.starts_with("Hello, World!\r\n\u{1b}$B"));
        assert!(body.contains("\u{1b}(B"));
    }

    #[test]
    fn missing_recipients_is_fatal() {
        let mut header = Header::new();
        header.set_author(mailbox("Author", "author@example.com"));
        let body = Body::Plain(TextBody::new(
            "text",
            CharsetEncoder::us_ascii(),
            ContentTransferEncoding::SevenBit,
        ));
        assert!(matches!(
            MailMessage::new(header, body).assemble(),
            Err(MailBuildError::NoRecipients)
        ));
    }

    #[test]
    fn unencodable_subject_is_fatal() {
        let mut header = Header::new();
        header.set_to(MailboxList::from(mailbox("R", "r@example.com")));
        header.set_subject("rocket \u{1f680}");
        header.set_date(pinned_date());
        let body = Body::Plain(TextBody::new(
            "text",
            CharsetEncoder::us_ascii(),
            ContentTransferEncoding::SevenBit,
        ));
        let message =
            MailMessage::new(header, body).with_header_charset(CharsetEncoder::iso_2022_jp());
        assert!(matches!(
            message.to_bytes(),
            Err(MailBuildError::DataConversionFailure { .. })
        ));
    }

    #[test]
    fn full_message_nests_mixed_alternative_related() {
        let cid = ContentId::new("image1", "mailer.example").unwrap();

        let plain = TextBody::new(
            "Plain fallback.",
            CharsetEncoder::us_ascii(),
            ContentTransferEncoding::SevenBit,
        );
        let mut html = HtmlBody::new(
            format!("<p>Rich <img src=\"{}\"/></p>", cid.cid_url()),
            CharsetEncoder::us_ascii(),
            ContentTransferEncoding::SevenBit,
            Boundary::from_token("rel-b"),
        );
        html.push_resource(
            FilePart::new(
                "dot.png",
                "image/png".parse().unwrap(),
                Cursor::new(vec![1u8, 2, 3]),
            )
            .with_content_id(cid),
        );
        let rich = Body::Rich(RichTextBody::new(plain, html, Boundary::from_token("alt-b")));
        let file = FilePart::new(
            "readme.txt",
            "text/plain".parse().unwrap(),
            Cursor::new(b"read me".to_vec()),
        );
        let body = Body::FileAttached(MixedBody::new(
            rich,
            vec![file],
            Boundary::from_token("mix-b"),
        ));

        let mut header = Header::new();
        header.set_author(mailbox("Author", "author@example.com"));
        header.set_to(MailboxList::from(mailbox("Recipient", "recipient@example.com")));
        header.set_subject("Everything at once");
        header.set_date(pinned_date());

        let text = String::from_utf8(MailMessage::new(header, body).to_bytes().unwrap()).unwrap();

        assert!(text.contains("Content-Type: multipart/mixed; boundary=mix-b"));
        assert!(text.contains("This is a multi-part message in MIME format.\r\n"));

        // frames must open in mixed > alternative > related order and
        // close in the reverse order
        let order = [
            "--mix-b\r\n",
            "Content-Type: multipart/alternative; boundary=alt-b",
            "--alt-b\r\n",
            "Content-Type: text/plain; charset=us-ascii",
            "Plain fallback.",
            "Content-Type: multipart/related; boundary=rel-b; type=\"text/html\"",
            "--rel-b\r\n",
            "cid:image1@mailer.example",
            "Content-ID: <image1@mailer.example>",
            "--rel-b--\r\n",
            "--alt-b--\r\n",
            "Content-Disposition: attachment; filename=readme.txt",
            "--mix-b--\r\n",
        ];
        let mut last = 0;
        for needle in order {
            let pos = text[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing or out of order"));
            last += pos;
        }
    }

    #[test]
    fn base64_packaging_round_trips() {
        let packaged = plain_jp_message().to_base64().unwrap();
        let bytes = BASE64.decode(packaged.as_bytes()).unwrap();
        let direct = plain_jp_message().to_bytes().unwrap();
        assert_eq!(bytes, direct);
    }

    #[test]
    fn write_to_reports_length() {
        let mut sink = vec![];
        let n = plain_jp_message().write_to(&mut sink).unwrap();
        assert_eq!(n as usize, sink.len());
        assert!(n > 0);
    }
}
