//! Data models shared across extraction and matching.

pub mod cell;
pub mod config;
pub mod matching;
pub mod record;
