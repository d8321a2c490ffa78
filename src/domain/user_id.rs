use crate::codec::CodecError;

const PREFIX: char = 'U';
const HEX_LENGTH: usize = 32;

/// Platform user identifier: `U` followed by 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct UserId {
    id: String,
    #[serde(skip)]
    bytes: [u8; 16],
}

impl UserId {
    pub fn parse(user_id: String) -> Result<UserId, CodecError> {
        let mut bytes = [0; 16];
        let is_valid = user_id.len() == HEX_LENGTH + 1
            && user_id.starts_with(PREFIX)
            && user_id[1..]
                .chars()
                .all(|char| matches!(char, '0'..='9' | 'a'..='f'))
            && hex::decode_to_slice(&user_id[1..], &mut bytes).is_ok();

        if !is_valid {
            return Err(CodecError::MalformedIdentifier(user_id));
        }

        Ok(Self { id: user_id, bytes })
    }

    pub(crate) fn from_bytes(bytes: &[u8; 16]) -> UserId {
        Self {
            id: format!("{}{}", PREFIX, hex::encode(bytes)),
            bytes: *bytes,
        }
    }

    /// The 16 bytes spelled by the hex part.
    pub(crate) fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
