//! Terminal output helpers.

mod output;

pub use output::{banner, error, header, info, kv, success, warning};
