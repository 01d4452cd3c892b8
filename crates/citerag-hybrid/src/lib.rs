//! Retrieval, ranking and context assembly.
//!
//! [`Retriever`] embeds a query, asks the vector store for candidates and
//! re-ranks them with [`FusionEngine`]. [`ContextBudgeter`] then packs the
//! ranked chunks into a bounded context and [`PromptComposer`] wraps that
//! context into a citation-grounded prompt.

pub mod budget;
pub mod fusion;
pub mod prompt;
pub mod retriever;

pub use budget::{BudgetedContext, ContextBudgeter, ContextBlock};
pub use fusion::FusionEngine;
pub use prompt::{Citation, ComposedPrompt, PromptComposer, NO_RESULTS_ANSWER, SYSTEM_PROMPT_TEMPLATE};
pub use retriever::Retriever;
