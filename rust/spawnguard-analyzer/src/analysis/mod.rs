//! The resolution engine: syntax model, fact store, guard detection,
//! call-target resolution, annotation and spawn validation.

pub mod annotate;
pub mod ast;
pub mod facts;
pub mod guard;
pub mod resolve;
pub mod span;
pub mod types;
pub mod validate;
