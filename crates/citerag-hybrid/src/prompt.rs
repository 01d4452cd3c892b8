//! Citation-grounded prompt assembly.
use serde::Serialize;

use citerag_core::types::Candidate;

use crate::budget::{BudgetedContext, ContextBudgeter};

/// `{context}` is replaced with the budgeted context.
pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a documentation assistant. Answer only from the retrieved passages below.

Rules:
1. Use only the retrieved passages for project-specific facts. If the answer is not in them, say that no authoritative answer was found in the indexed docs or chat corpus.
2. Cite every factual claim with its source in brackets: [title — heading — url].
3. Keep code blocks verbatim and cite them too.
4. End with a \"Sources\" section listing the passages you used.
5. Do not invent versions, commits or private user data.

Retrieved passages:
{context}
";

/// Answer to render when retrieval comes back empty.
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in the indexed docs or chat corpus.";

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub chunk_id: String,
    pub title: String,
    pub heading_path: String,
    pub url: String,
    pub snippet: String,
}

impl Citation {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let chunk = &candidate.chunk;
        Self {
            chunk_id: chunk.id.clone(),
            title: if chunk.title.is_empty() { "Untitled".to_string() } else { chunk.title.clone() },
            heading_path: chunk.heading_path.clone(),
            url: chunk.url.clone(),
            snippet: snippet(&chunk.text),
        }
    }
}

/// First 200 characters, with `...` appended when the text was longer.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedPrompt {
    pub prompt: String,
    pub context: BudgetedContext,
    /// One entry per context block, in context order.
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    budgeter: ContextBudgeter,
}

impl PromptComposer {
    pub fn new(budgeter: ContextBudgeter) -> Self { Self { budgeter } }

    pub fn compose(&self, query: &str, ranked: &[Candidate]) -> ComposedPrompt {
        let context = self.budgeter.select(ranked);
        let citations = ranked.iter().take(context.len()).map(Citation::from_candidate).collect();
        let system = SYSTEM_PROMPT_TEMPLATE.replace("{context}", &context.text());
        let prompt = format!("{system}\n\nUser question: {query}\n\nAnswer:");
        ComposedPrompt { prompt, context, citations }
    }
}
