//! Shared utilities and common types for the backplane toolkit.
//!
//! This crate provides functionality used across all other crates:
//! - JWT token codec (signing and verification)
//! - Cryptographic utilities (hashing)
//! - Pagination envelope for paged listings

pub mod crypto;
pub mod jwt;
pub mod pagination;
