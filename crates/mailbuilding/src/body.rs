use crate::charsets::CharsetEncoder;
use crate::content_id::ContentId;
use crate::cte::{normalize_line_endings, ContentTransferEncoding};
use crate::ctestream::CteStream;
use crate::fragment::{BoxFragmentIterator, ConstBuf, LazyStream, SequenceStream};
use crate::rfc2231::{encode_parameter, render_with_parameters};
use crate::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Read;

const BOUNDARY_RANDOM_LEN: usize = 24;
const BOUNDARY_SUFFIX: &str = ".mime";

/// A multipart delimiter: 24 random alphanumerics plus a fixed suffix.
/// Randomized tokens are how the "boundary never appears in a body"
/// assumption is carried; bodies are not scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let token: String = (&mut *rng)
            .sample_iter(Alphanumeric)
            .take(BOUNDARY_RANDOM_LEN)
            .map(char::from)
            .collect();
        Self(format!("{token}{BOUNDARY_SUFFIX}"))
    }

    /// Fixed token, for callers that need reproducible output.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `text/plain` content in a declared charset.
pub struct TextBody {
    text: String,
    charset: CharsetEncoder,
    cte: ContentTransferEncoding,
}

impl TextBody {
    pub fn new(
        text: impl Into<String>,
        charset: CharsetEncoder,
        cte: ContentTransferEncoding,
    ) -> Self {
        Self {
            text: text.into(),
            charset,
            cte,
        }
    }
}

/// `text/html` content; grows a `multipart/related` frame when inline
/// resources are attached.
pub struct HtmlBody {
    html: String,
    charset: CharsetEncoder,
    cte: ContentTransferEncoding,
    resources: Vec<FilePart>,
    boundary: Boundary,
}

impl HtmlBody {
    pub fn new(
        html: impl Into<String>,
        charset: CharsetEncoder,
        cte: ContentTransferEncoding,
        boundary: Boundary,
    ) -> Self {
        Self {
            html: html.into(),
            charset,
            cte,
            resources: vec![],
            boundary,
        }
    }

    /// Attach an inline resource, addressable from the HTML through its
    /// Content-ID `cid:` URL.
    pub fn push_resource(&mut self, resource: FilePart) {
        self.resources.push(resource);
    }
}

/// `multipart/alternative`: the same content as plain text and HTML.
pub struct RichTextBody {
    plain: TextBody,
    html: HtmlBody,
    boundary: Boundary,
}

impl RichTextBody {
    pub fn new(plain: TextBody, html: HtmlBody, boundary: Boundary) -> Self {
        Self {
            plain,
            html,
            boundary,
        }
    }
}

/// `multipart/mixed`: a main body plus attached files.
pub struct MixedBody {
    main: Box<Body>,
    files: Vec<FilePart>,
    boundary: Boundary,
}

impl MixedBody {
    pub fn new(main: Body, files: Vec<FilePart>, boundary: Boundary) -> Self {
        Self {
            main: Box::new(main),
            files,
            boundary,
        }
    }
}

/// An attachment leaf: metadata plus a single-pass byte source that is
/// consumed exactly once, at assembly.
pub struct FilePart {
    filename: String,
    content_type: mime::Mime,
    content_id: Option<ContentId>,
    filename_charset: CharsetEncoder,
    language: Option<String>,
    content: Box<dyn Read>,
}

impl FilePart {
    pub fn new(
        filename: impl Into<String>,
        content_type: mime::Mime,
        content: impl Read + 'static,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            content_id: None,
            filename_charset: CharsetEncoder::utf8(),
            language: None,
            content: Box::new(content),
        }
    }

    pub fn with_content_id(mut self, id: ContentId) -> Self {
        self.content_id = Some(id);
        self
    }

    /// Charset and language tag used when the filename needs RFC 2231
    /// continuation encoding.
    pub fn with_filename_charset(
        mut self,
        charset: CharsetEncoder,
        language: Option<&str>,
    ) -> Self {
        self.filename_charset = charset;
        self.language = language.map(|l| l.to_string());
        self
    }

    fn into_part_stream(self) -> Result<BoxFragmentIterator> {
        let mut head = String::new();
        let filename = encode_parameter(
            "filename",
            &self.filename,
            &self.filename_charset,
            self.language.as_deref(),
        )?;
        head.push_str("Content-Disposition: ");
        head.push_str(&render_with_parameters(
            "Content-Disposition: ".len(),
            "attachment",
            vec![filename],
        ));
        head.push_str("\r\n");
        head.push_str("Content-Type: ");
        head.push_str(self.content_type.essence_str());
        head.push_str("\r\n");
        if let Some(id) = &self.content_id {
            head.push_str("Content-ID: ");
            head.push_str(&id.to_string());
            head.push_str("\r\n");
        }
        head.push_str("Content-Transfer-Encoding: base64\r\n\r\n");

        Ok(Box::new(SequenceStream::new(vec![
            ascii_fragment(&head)?,
            Box::new(CteStream::new(
                ContentTransferEncoding::Base64,
                self.content,
            )?),
        ])))
    }
}

/// The recursive body tree. Each variant knows its derived content
/// headers and how to stream itself as lazy fragments.
pub enum Body {
    Plain(TextBody),
    Rich(RichTextBody),
    Html(HtmlBody),
    FileAttached(MixedBody),
}

impl Body {
    /// The derived `Content-Type` (and, for leaf parts,
    /// `Content-Transfer-Encoding`) header lines, each CRLF-terminated.
    pub(crate) fn content_headers(&self) -> Result<String> {
        match self {
            Body::Plain(t) => leaf_headers("text/plain", &t.charset, t.cte),
            Body::Html(h) if h.resources.is_empty() => {
                leaf_headers("text/html", &h.charset, h.cte)
            }
            Body::Html(h) => multipart_headers(
                "multipart/related",
                &h.boundary,
                Some(("type", "text/html")),
            ),
            Body::Rich(r) => multipart_headers("multipart/alternative", &r.boundary, None),
            Body::FileAttached(m) => multipart_headers("multipart/mixed", &m.boundary, None),
        }
    }

    /// The body content after the blank line; multipart variants frame
    /// their children with `--boundary` lines.
    pub(crate) fn into_stream(self) -> Result<BoxFragmentIterator> {
        match self {
            Body::Plain(t) => encoded_leaf(&t.text, &t.charset, t.cte),
            Body::Html(h) if h.resources.is_empty() => encoded_leaf(&h.html, &h.charset, h.cte),
            Body::Html(h) => {
                let boundary = h.boundary;
                let html = Body::Html(HtmlBody {
                    html: h.html,
                    charset: h.charset,
                    cte: h.cte,
                    resources: vec![],
                    boundary: Boundary::from_token(""),
                });
                let mut children = vec![
                    ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?,
                    lazy_part(html),
                    ascii_fragment("\r\n")?,
                ];
                for resource in h.resources {
                    children.push(ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?);
                    children.push(Box::new(LazyStream::new(move || {
                        resource.into_part_stream()
                    })));
                }
                children.push(ascii_fragment(&format!("--{}--\r\n", boundary.as_str()))?);
                Ok(Box::new(SequenceStream::new(children)))
            }
            Body::Rich(r) => {
                let boundary = r.boundary;
                let children = vec![
                    ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?,
                    lazy_part(Body::Plain(r.plain)),
                    ascii_fragment("\r\n")?,
                    ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?,
                    lazy_part(Body::Html(r.html)),
                    ascii_fragment("\r\n")?,
                    ascii_fragment(&format!("--{}--\r\n", boundary.as_str()))?,
                ];
                Ok(Box::new(SequenceStream::new(children)))
            }
            Body::FileAttached(m) => {
                let boundary = m.boundary;
                let mut children = vec![
                    ascii_fragment("This is a multi-part message in MIME format.\r\n\r\n")?,
                    ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?,
                    lazy_part(*m.main),
                    ascii_fragment("\r\n")?,
                ];
                for file in m.files {
                    children.push(ascii_fragment(&format!("--{}\r\n", boundary.as_str()))?);
                    children.push(Box::new(LazyStream::new(move || file.into_part_stream())));
                }
                children.push(ascii_fragment(&format!("--{}--\r\n", boundary.as_str()))?);
                Ok(Box::new(SequenceStream::new(children)))
            }
        }
    }

    /// Content headers, blank line, then the body stream; the shape of
    /// a nested part.
    pub(crate) fn into_part_stream(self) -> Result<BoxFragmentIterator> {
        let head = format!("{}\r\n", self.content_headers()?);
        Ok(Box::new(SequenceStream::new(vec![
            ascii_fragment(&head)?,
            self.into_stream()?,
        ])))
    }
}

fn ascii_fragment(s: &str) -> Result<BoxFragmentIterator> {
    Ok(Box::new(ConstBuf::from_ascii(s)?))
}

fn lazy_part(body: Body) -> BoxFragmentIterator {
    Box::new(LazyStream::new(move || body.into_part_stream()))
}

fn leaf_headers(
    content_type: &str,
    charset: &CharsetEncoder,
    cte: ContentTransferEncoding,
) -> Result<String> {
    let charset_param = encode_parameter(
        "charset",
        &charset.name().to_ascii_lowercase(),
        charset,
        None,
    )?;
    Ok(format!(
        "Content-Type: {}\r\nContent-Transfer-Encoding: {}\r\n",
        render_with_parameters("Content-Type: ".len(), content_type, vec![charset_param]),
        cte.label()
    ))
}

fn multipart_headers(
    content_type: &str,
    boundary: &Boundary,
    extra: Option<(&str, &str)>,
) -> Result<String> {
    let ascii = CharsetEncoder::us_ascii();
    let mut params = vec![encode_parameter("boundary", boundary.as_str(), &ascii, None)?];
    if let Some((name, value)) = extra {
        params.push(encode_parameter(name, value, &ascii, None)?);
    }
    Ok(format!(
        "Content-Type: {}\r\n",
        render_with_parameters("Content-Type: ".len(), content_type, params)
    ))
}

fn encoded_leaf(
    text: &str,
    charset: &CharsetEncoder,
    cte: ContentTransferEncoding,
) -> Result<BoxFragmentIterator> {
    let bytes = charset.encode(&normalize_line_endings(text))?;
    Ok(Box::new(ConstBuf::new(cte.encode(&bytes)?)))
}
