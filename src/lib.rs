//! Alvorecer Bible library
//!
//! Offline access to a static Bible dataset with a local cache that expires
//! old entries and trims itself when it grows too large.

pub mod cache;
pub mod cli;
pub mod data;
pub mod service;
