use proptest::prelude::*;

use citerag_core::config::{BudgetSettings, FusionSettings};
use citerag_core::types::{Candidate, Chunk, Payload};
use citerag_hybrid::{ContextBudgeter, FusionEngine};

const WORDS: &[&str] = &["swc", "minify", "config", "plugin", "slack", "thread", "rust", "wasm"];
const SOURCES: &[&str] = &["swc_docs", "github", "slack", "forum"];

fn candidate(i: usize, words: &[usize], source: usize, vector: f32) -> Candidate {
    let text = words.iter().map(|&w| WORDS[w]).collect::<Vec<_>>().join(" ");
    Candidate {
        chunk: Chunk { id: format!("c{i}"), source_type: SOURCES[source].to_string(), text, title: format!("T{i}"), ..Chunk::default() },
        payload: Payload::new(),
        vector_score: vector,
        lexical_score: 0.0,
        normalized_lexical_score: 0.0,
        source_boost: 1.0,
        final_score: vector,
    }
}

fn candidates() -> impl Strategy<Value = Vec<Candidate>> {
    prop::collection::vec((prop::collection::vec(0..WORDS.len(), 0..12), 0..SOURCES.len(), 0.0f32..1.0), 0..20)
        .prop_map(|items| items.into_iter().enumerate().map(|(i, (w, s, v))| candidate(i, &w, s, v)).collect())
}

fn query() -> impl Strategy<Value = String> {
    prop::collection::vec(0..WORDS.len(), 0..5).prop_map(|w| w.into_iter().map(|i| WORDS[i]).collect::<Vec<_>>().join(" "))
}

proptest! {
    #[test]
    fn ranking_is_deterministic(cands in candidates(), q in query(), limit in 0usize..25) {
        let engine = FusionEngine::default();
        let a = engine.rank(&q, cands.clone(), limit, true);
        let b = engine.rank(&q, cands, limit, true);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn scores_are_bounded(cands in candidates(), q in query()) {
        let engine = FusionEngine::default();
        let n = cands.len();
        let ranked = engine.rank(&q, cands, n, true);
        prop_assert_eq!(ranked.len(), n);
        for c in &ranked {
            prop_assert!((0.0..=1.0).contains(&c.normalized_lexical_score));
            prop_assert!(c.lexical_score >= 0.0);
            prop_assert!(c.final_score >= 0.0);
        }
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn output_is_truncated_to_limit(cands in candidates(), q in query(), limit in 0usize..25, rerank in any::<bool>()) {
        let n = cands.len();
        let ranked = FusionEngine::default().rank(&q, cands, limit, rerank);
        prop_assert_eq!(ranked.len(), n.min(limit));
    }

    #[test]
    fn ties_keep_vector_order(n in 2usize..10, v in 0.0f32..1.0, q in query()) {
        let cands: Vec<Candidate> = (0..n).map(|i| candidate(i, &[0, 1], 0, v)).collect();
        let ranked = FusionEngine::default().rank(&q, cands, n, true);
        let ids: Vec<String> = ranked.iter().map(|c| c.id().to_string()).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn zero_boost_ties_keep_vector_order(vectors in prop::collection::vec(-1.0f32..0.0, 2..10), q in query()) {
        let mut settings = FusionSettings { lexical_divisor: 1e-3, ..FusionSettings::default() };
        settings.source_boost.insert("forum".into(), 0.0);
        // "forum" is SOURCES[3]; mixed lexical hits give a mix of +0.0 and -0.0
        let cands: Vec<Candidate> = vectors.iter().enumerate().map(|(i, &v)| candidate(i, &[i % WORDS.len()], 3, v)).collect();
        let n = cands.len();
        let ranked = FusionEngine::new(settings).rank(&q, cands, n, true);
        let ids: Vec<String> = ranked.iter().map(|c| c.id().to_string()).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn raising_vector_score_never_lowers_rank(cands in candidates(), q in query(), pick in any::<prop::sample::Index>(), delta in 0.0f32..1.0) {
        prop_assume!(!cands.is_empty());
        let engine = FusionEngine::default();
        let n = cands.len();
        let target = format!("c{}", pick.index(n));
        let above = |ranked: &[Candidate]| -> Vec<String> {
            ranked.iter().take_while(|c| c.id() != target).map(|c| c.id().to_string()).collect()
        };

        let before = above(&engine.rank(&q, cands.clone(), n, true));
        let mut raised = cands;
        let i = pick.index(n);
        raised[i].vector_score += delta;
        raised[i].final_score = raised[i].vector_score;
        let after = above(&engine.rank(&q, raised, n, true));

        for id in &after {
            prop_assert!(before.contains(id), "{} overtook {} after its vector score rose", id, target);
        }
    }

    #[test]
    fn fused_score_is_monotone_in_vector_score(a in -1.0f32..1.0, b in -1.0f32..1.0, lex in 0.0f32..1.0, boost in 0.0f32..2.0) {
        let engine = FusionEngine::new(FusionSettings::default());
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(engine.fuse(lo, lex, boost) <= engine.fuse(hi, lex, boost));
    }

    #[test]
    fn budget_selection_is_idempotent(cands in candidates(), tokens in 0usize..200) {
        let budgeter = ContextBudgeter::new(BudgetSettings { max_context_tokens: tokens, chars_per_token: 4 });
        let first = budgeter.select(&cands);
        prop_assert!(first.used_chars <= first.budget_chars);
        let again = budgeter.select(&cands[..first.len()]);
        prop_assert_eq!(first, again);
    }
}
