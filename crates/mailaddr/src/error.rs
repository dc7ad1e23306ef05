use thiserror::Error;

/// One variant per rule that can reject an address, so that callers can
/// explain to a user exactly which part of their input was at fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("quoted string is missing its closing double quote")]
    UnterminatedQuotedString,
    #[error("invalid scalar inside quoted string")]
    InvalidScalarInQuotedString,
    #[error("IP address literal is missing its closing bracket")]
    UnterminatedIpAddressLiteral,
    #[error("invalid scalar inside IP address literal")]
    InvalidScalarInIpAddressLiteral,
    #[error("IP address literal does not parse as an address")]
    InvalidIpAddressLiteral,
    #[error("unbalanced parenthesis in comment")]
    UnbalancedParenthesis,
    #[error("address exceeds 254 scalars")]
    TooLong,
    #[error("more than one @ sign outside of quotes and comments")]
    DuplicateAtSigns,
    #[error("no @ sign separating local part from domain")]
    MissingAtSign,
    #[error("nothing before the @ sign")]
    MissingLocalPart,
    #[error("nothing after the @ sign")]
    MissingDomain,
    #[error("comment is only permitted at the start or end of a side")]
    InvalidCommentPosition,
    #[error("domain does not parse as a host name")]
    InvalidDomain,
    #[error("consecutive dots")]
    ConsecutiveDots,
    #[error("dot at the start or end of the local part")]
    InvalidDotPosition,
    #[error("invalid scalar in local part")]
    InvalidScalarInLocalPart,
    #[error("quoted string must stand alone or be joined by dots")]
    InvalidQuotedStringPosition,
    #[error("local part exceeds 64 scalars")]
    TooLongLocalPart,
}
