//! Random identifiers and short codes.
//!
//! Identity URNs, token strings, remember-me tokens and shared secrets are all
//! rendered from a random UUID, either as lower-case hex or as mixed-case
//! base64url when shorter strings are wanted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

/// A random identifier rendered as a short string.
///
/// Lower-case output is 32 hex characters; mixed-case output is 22 base64url
/// characters.
pub fn short_id(mixed_case: bool) -> String {
    let id = Uuid::new_v4();
    if mixed_case {
        URL_SAFE_NO_PAD.encode(id.as_bytes())
    } else {
        id.simple().to_string()
    }
}

/// Fill a fixed-width buffer from the operating system's CSPRNG
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
