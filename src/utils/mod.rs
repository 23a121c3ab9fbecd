//! Utility helpers: key-case translation at the resource boundary.
pub mod case;

pub use case::{pascal_case_to_camel_case, pascal_case_to_camel_case_keys};
