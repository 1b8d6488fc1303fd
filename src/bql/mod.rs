//! BQL processing module
//!
//! This module provides:
//! - `parser`: BQL lexer and parser
//! - `types`: BQL data types and runtime values
//! - `schema`: Table and column schema definitions
//! - `plan`: Execution plan generation
//! - `executor`: Query and mutation execution
//! - `engine`: Session, transaction and storage engine abstraction

pub mod parser;
pub mod types;
pub mod schema;
pub mod plan;
pub mod executor;
pub mod engine;
