//! URL handling module
//!
//! Canonicalization is the basis for URL identity everywhere else in the
//! crawler: the frontier's seen set, the rate limiter's host keys, and the
//! index's unique `url` column all operate on canonical forms.

mod normalize;

pub use normalize::{normalize_url, MAX_URL_LEN};
