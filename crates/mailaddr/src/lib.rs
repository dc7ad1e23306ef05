mod domain;
mod error;
mod lexer;
mod preparser;
mod parser;

pub use error::AddressError;
pub type Result<T> = std::result::Result<T, AddressError>;

pub use domain::Domain;
pub use lexer::{lex, IpLiteral, MailToken};
pub use parser::{DomainPart, MailAddress};
pub use preparser::{preparse, CommentPart, MailNode};
