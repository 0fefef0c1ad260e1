//! Data model shared by the dialectic SQL generator: the query IR, the error
//! type, and the small grammars for SQL templates and native type names.

pub mod error;
pub mod ir;
pub mod native_type;
pub mod template;

pub use error::{Error, Errors, MessageKind, Reason, WithErrorInfo};
