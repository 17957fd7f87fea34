//! Knowledge store models

pub mod pest;
pub mod recommendation;

pub use pest::*;
pub use recommendation::*;
