//! Types library for the binary row feed
//!
//! Defines the column/schema model that fixes the byte layout shared by
//! every feed and the external renderer that consumes encoded rows.
//!
//! # Modules
//! - `column`: Column metadata and slot widths
//! - `schema`: Validated column lists, row width and offsets
//! - `value`: Field values handed to the encoder
//! - `errors`: Schema validation errors

pub mod column;
pub mod errors;
pub mod schema;
pub mod value;

/// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

