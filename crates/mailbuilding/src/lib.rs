mod address;
mod body;
mod charsets;
mod content_id;
mod cte;
mod ctestream;
mod error;
mod fragment;
mod headers;
mod message;
mod rfc2047;
mod rfc2231;
mod sevenbit;

pub use error::MailBuildError;
pub type Result<T> = std::result::Result<T, MailBuildError>;

pub use address::{Mailbox, MailboxList};
pub use body::{Body, Boundary, FilePart, HtmlBody, MixedBody, RichTextBody, TextBody};
pub use charsets::CharsetEncoder;
pub use content_id::ContentId;
pub use cte::{
    encode_7bit, encode_base64, encode_quoted_printable, has_lone_cr_or_lf,
    ContentTransferEncoding, BASE64_RFC2045,
};
pub use ctestream::{CteStream, StreamState};
pub use fragment::{
    drain_into, BoxFragmentIterator, ConstBuf, FragmentIterator, LazyStream, SequenceStream,
};
pub use headers::{Header, HeaderValue};
pub use message::MailMessage;
pub use rfc2047::encode_header_value;
pub use rfc2231::encode_parameter;
pub use sevenbit::{SafeByteBuffer, SevenBitByte};

pub use mailaddr::{AddressError, Domain, DomainPart, IpLiteral, MailAddress};
