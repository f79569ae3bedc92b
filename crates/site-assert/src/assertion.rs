//! Assertion primitives shared by the HTTP and browser orchestrators.
//!
//! - [`soft`]: the failure collector every check appends to
//! - [`text`]: contains/starts-with/ends-with/not-contains checks on strings
//! - [`shape`]: key-set validation of declarative records

pub mod shape;
pub mod soft;
pub mod text;
