//! Helper types shared across the data model.

pub mod b64;

pub use b64::Base64Bytes;
