//! Doodletank Upload
//!
//! Sends finished drawings to the gallery backend. Drawings that the
//! classifier did not recognize as the subject are flagged for moderator
//! review instead of being rejected.

pub mod client;
pub mod submission;

pub use client::{UploadClient, UploadReceipt};
pub use submission::{normalize_artist, Submission, ANONYMOUS_ARTIST};
