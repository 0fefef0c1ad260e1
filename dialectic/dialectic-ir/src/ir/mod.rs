//! The intermediate representation consumed by SQL generation.

mod expr;
mod field;
mod query;
mod temporal;
mod types;

pub use expr::*;
pub use field::*;
pub use query::*;
pub use temporal::*;
pub use types::*;
