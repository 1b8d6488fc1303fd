//! bqldb - A bracket query language database implementation in Rust
//!
//! This crate provides a minimal multi-database engine with:
//! - BQL parsing (lexer, parser, AST)
//! - Query planning and execution
//! - Scalar subqueries in filters
//! - Pluggable storage engines with an append-only disk backend

pub mod bql;
pub mod error;
pub mod storage;
