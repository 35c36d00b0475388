//! Fetch-and-cache client for a WaniKani user's learned vocabulary.
//!
//! The vocabulary is grouped by part of speech and handed to a sentence
//! generator, which lives outside this crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod wanikani;
