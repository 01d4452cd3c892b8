/// Lower-cases and splits on whitespace. No stemming, no stop words: query
/// and corpus must go through this exact function for scores to line up.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split_whitespace().map(str::to_owned).collect()
}
