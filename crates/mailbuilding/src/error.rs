use mailaddr::AddressError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailBuildError {
    #[error("charset {charset} cannot represent {text:?}")]
    DataConversionFailure { charset: String, text: String },
    #[error("no canonical character set name for label {0:?}")]
    NoCharacterSetName(String),
    #[error("invalid Content-Transfer-Encoding: {0}")]
    InvalidContentTransferEncoding(String),
    #[error("input contains bytes that a 7bit stream cannot carry")]
    CannotEncode,
    #[error("no 7-bit representation for Content-Transfer-Encoding {0}")]
    Non7bitRepresentation(String),
    #[error("unexpected error in underlying stream")]
    UnexpectedError,
    #[error("output sink has reached its capacity")]
    HasReachedCapacity,
    #[error("no data was written to the stream")]
    NoDataWrittenToStream,
    #[error("message has no recipients")]
    NoRecipients,
    #[error("header {0:?} is derived from the body and cannot be set")]
    ReservedHeaderName(String),
    #[error("invalid content id: {0}")]
    InvalidContentId(&'static str),
    #[error(transparent)]
    Address(#[from] AddressError),
}
