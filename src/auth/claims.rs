use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

/// Bearer token payload. Tokens are minted by the identity service; here they are only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner of every record the request touches.
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Issuers that predate token kinds omit it.
    #[serde(default)]
    pub kind: TokenKind,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.kind == TokenKind::Access
    }
}
