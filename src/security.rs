// ABOUTME: Secret generation for client credentials, authorization codes, and tokens
// ABOUTME: 32 bytes from the system CSPRNG, hex-encoded to 64 characters
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

/// Length in bytes of every generated secret
pub const SECRET_LEN: usize = 32;

/// Generate a fresh secret: 32 random bytes, hex-encoded (64 chars).
///
/// Used for `client_id`, `client_secret`, grant codes, access tokens, and
/// refresh tokens; each call produces an independent value. If the system
/// RNG is unavailable the value degrades to UUID-derived randomness rather
/// than a fixed string, so uniqueness still holds.
#[must_use]
pub fn generate_secret() -> String {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; SECRET_LEN];
    if rng.fill(&mut bytes).is_ok() {
        return hex::encode(bytes);
    }

    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
