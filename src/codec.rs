//! Reversible encoding of platform user ids into short tokens that can be
//! quoted inside chat messages, e.g. `Approve subscriber "Nguan" (SWDHXSmElwW7qGH_BscPLw)`.
//!
//! A token is the URL-safe, unpadded base64 form of the 16 bytes behind the
//! hex part of the id, so it is always 22 characters long.

use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use regex::Regex;

use crate::domain::user_id::UserId;

// Tokens are URL-safe (`-`, `_`), but `+` is accepted too for messages that
// carry the standard alphabet.
static EMBEDDED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?P<token>[A-Za-z0-9+_-]+)\)").expect("embedded token pattern is valid")
});

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("{0:?} is not a valid user id.")]
    MalformedIdentifier(String),
    #[error("{0:?} is not a valid subscriber token.")]
    MalformedToken(String),
    #[error("No subscriber token found in the message.")]
    TokenNotFound,
}

impl UserId {
    /// Opaque token standing in for this id inside chat messages.
    pub fn to_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.as_bytes())
    }
}

pub fn encode_user_id(user_id: &str) -> Result<String, CodecError> {
    let user_id = UserId::parse(user_id.to_owned())?;

    Ok(user_id.to_token())
}

pub fn decode_user_id(token: &str) -> Result<UserId, CodecError> {
    let malformed = || CodecError::MalformedToken(token.to_owned());

    let mut encoded: String = token
        .chars()
        .map(|char| match char {
            '-' => '+',
            '_' => '/',
            char => char,
        })
        .collect();

    match encoded.len() % 4 {
        0 => {}
        2 => encoded.push_str("=="),
        3 => encoded.push('='),
        _ => return Err(malformed()),
    }

    let decoded = STANDARD.decode(&encoded).map_err(|_| malformed())?;
    let bytes: [u8; 16] = decoded.try_into().map_err(|_| malformed())?;

    Ok(UserId::from_bytes(&bytes))
}

/// Decodes the token quoted in the first parenthesised group of `text`.
pub fn extract_user_id(text: &str) -> Result<UserId, CodecError> {
    let token = EMBEDDED_TOKEN
        .captures(text)
        .and_then(|captures| captures.name("token"))
        .ok_or(CodecError::TokenNotFound)?;

    decode_user_id(token.as_str())
}
