//! citerag-lexical
//!
//! Term-frequency ranking over a small, fixed candidate window. The index is
//! cheap to build and meant to live for exactly one retrieval call.
pub mod index;
pub mod tokenize;

pub use index::{Bm25Params, LexicalIndex};
pub use tokenize::tokenize;
