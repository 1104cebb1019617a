//! Cryptography module - SHA-512 hashing and Schnorr signing keys

mod hash;
mod keys;

pub use hash::*;
pub use keys::*;
