//! Packs ranked candidates into a character-bounded context.
use serde::Serialize;

use citerag_core::config::BudgetSettings;
use citerag_core::types::Candidate;

pub const BLOCK_SEPARATOR: &str = "\n---\n";

/// One formatted candidate as it appears in the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBlock {
    pub chunk_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetedContext {
    pub blocks: Vec<ContextBlock>,
    /// Characters used by the blocks, separators excluded.
    pub used_chars: usize,
    pub budget_chars: usize,
}

impl BudgetedContext {
    pub fn is_empty(&self) -> bool { self.blocks.is_empty() }

    pub fn len(&self) -> usize { self.blocks.len() }

    /// The blocks joined with [`BLOCK_SEPARATOR`].
    pub fn text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(BLOCK_SEPARATOR)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBudgeter {
    settings: BudgetSettings,
}

impl ContextBudgeter {
    pub fn new(settings: BudgetSettings) -> Self { Self { settings } }

    pub fn budget_chars(&self) -> usize {
        self.settings.max_context_tokens.saturating_mul(self.settings.chars_per_token)
    }

    /// `"[{id}] {title}"`, then `" > {heading}"` when present, then
    /// `"\n{text}\n"`.
    pub fn format_block(candidate: &Candidate) -> String {
        let chunk = &candidate.chunk;
        let title = if chunk.title.is_empty() { "Untitled" } else { chunk.title.as_str() };
        let mut block = format!("[{}] {}", chunk.id, title);
        if !chunk.heading_path.is_empty() {
            block.push_str(" > ");
            block.push_str(&chunk.heading_path);
        }
        block.push('\n');
        block.push_str(&chunk.text);
        block.push('\n');
        block
    }

    /// Takes candidates in rank order until the next block would overflow
    /// the budget. Blocks are never truncated.
    pub fn select(&self, ranked: &[Candidate]) -> BudgetedContext {
        let budget_chars = self.budget_chars();
        let mut context = BudgetedContext { budget_chars, ..BudgetedContext::default() };
        for candidate in ranked {
            let text = Self::format_block(candidate);
            let len = text.chars().count();
            if context.used_chars + len > budget_chars {
                break;
            }
            context.used_chars += len;
            context.blocks.push(ContextBlock { chunk_id: candidate.id().to_string(), text });
        }
        tracing::debug!(selected = context.len(), offered = ranked.len(), used_chars = context.used_chars, budget_chars, "budgeted context");
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citerag_core::types::{Chunk, Payload, ScoredPoint};

    fn candidate(id: &str, title: &str, heading: &str, text: &str) -> Candidate {
        let mut c = Candidate::from_point(ScoredPoint { id: id.into(), score: Some(0.5), payload: Payload::new() });
        c.chunk = Chunk { id: id.into(), title: title.into(), heading_path: heading.into(), text: text.into(), ..Chunk::default() };
        c
    }

    #[test]
    fn block_format() {
        assert_eq!(ContextBudgeter::format_block(&candidate("a_0", "Intro", "Guide > Setup", "body")), "[a_0] Intro > Guide > Setup\nbody\n");
        assert_eq!(ContextBudgeter::format_block(&candidate("a_1", "", "", "x")), "[a_1] Untitled\nx\n");
    }

    #[test]
    fn zero_budget_selects_nothing() {
        let budgeter = ContextBudgeter::new(BudgetSettings { max_context_tokens: 0, chars_per_token: 4 });
        let ranked: Vec<Candidate> = (0..10).map(|i| candidate(&format!("c{i}"), "t", "", "text")).collect();
        let ctx = budgeter.select(&ranked);
        assert!(ctx.is_empty());
        assert_eq!(ctx.text(), "");
    }

    #[test]
    fn stops_before_first_overflowing_block() {
        // each block is "[cN] t\nabcd\n" = 12 chars
        let budgeter = ContextBudgeter::new(BudgetSettings { max_context_tokens: 6, chars_per_token: 4 });
        let ranked = vec![candidate("c1", "t", "", "abcd"), candidate("c2", "t", "", "abcd"), candidate("c3", "t", "", "x")];
        let ctx = budgeter.select(&ranked);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.used_chars, 24);
        assert_eq!(ctx.text(), "[c1] t\nabcd\n\n---\n[c2] t\nabcd\n");
    }

    #[test]
    fn oversized_first_block_yields_empty_selection() {
        let budgeter = ContextBudgeter::new(BudgetSettings { max_context_tokens: 1, chars_per_token: 4 });
        let ranked = vec![candidate("big", "title", "", "a long body"), candidate("s", "", "", "")];
        assert!(budgeter.select(&ranked).is_empty());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // "[é] t\néééé\n" is 11 characters but 16 bytes
        let budgeter = ContextBudgeter::new(BudgetSettings { max_context_tokens: 11, chars_per_token: 1 });
        assert_eq!(budgeter.select(&[candidate("é", "t", "", "éééé")]).len(), 1);
    }
}
