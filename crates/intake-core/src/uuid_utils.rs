//! Identifier helpers.
//!
//! Row ids are UUIDv7 so they sort by creation time. Share tokens are UUIDv4:
//! they are bearer secrets and must not leak their creation time.

use uuid::Uuid;

/// Generate a new time-ordered row identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a new share token.
#[inline]
pub fn new_share_token() -> Uuid {
    Uuid::new_v4()
}
