//! Bearer-token verification. Tokens are issued elsewhere; this side only
//! checks them and resolves the caller's owner id.

mod claims;
pub mod extractors;
pub mod jwt;

pub use claims::{Claims, TokenKind};
pub use extractors::AuthUser;
pub use jwt::JwtKeys;
