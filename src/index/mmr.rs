//! Maximal marginal relevance
//!
//! Plain top-k over chunks tends to return several near-identical chunks of
//! the same file. MMR picks each next result by trading relevance to the
//! query against similarity to what is already selected:
//!
//! `score = λ · sim(query, d) − (1 − λ) · max sim(d, selected)`

/// Cosine similarity, 0.0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Select up to `k` candidate indices by MMR
///
/// Candidates are first narrowed to the `fetch_k` most similar to the
/// query. The first pick is always the most relevant candidate.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    fetch_k: usize,
    lambda: f32,
) -> Vec<usize> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut pool: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();
    pool.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    pool.truncate(fetch_k.max(k));

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    while selected.len() < k && !pool.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, (idx, relevance)) in pool.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(candidates[*idx], candidates[*s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        selected.push(pool.remove(best_pos).0);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_mmr_prefers_diverse_results() {
        let query = [1.0, 0.0];
        let a = [1.0, 0.0];
        let a_dup = [0.99, 0.01];
        let b = [0.6, 0.8];
        let candidates: Vec<&[f32]> = vec![&a, &a_dup, &b];

        // pure relevance keeps the duplicate
        let relevant = maximal_marginal_relevance(&query, &candidates, 2, 3, 1.0);
        assert_eq!(relevant, vec![0, 1]);

        // diversity-leaning picks the orthogonal-ish candidate second
        let diverse = maximal_marginal_relevance(&query, &candidates, 2, 3, 0.25);
        assert_eq!(diverse, vec![0, 2]);
    }

    #[test]
    fn test_mmr_bounds() {
        let a = [1.0, 0.0];
        let candidates: Vec<&[f32]> = vec![&a];
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 0, 5, 0.5).is_empty());
        assert_eq!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 5, 5, 0.5), vec![0]);
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &[], 5, 5, 0.5).is_empty());
    }

    #[test]
    fn test_mmr_fetch_k_limits_pool() {
        let q = [1.0, 0.0];
        let near = [1.0, 0.1];
        let far = [0.0, 1.0];
        let candidates: Vec<&[f32]> = vec![&far, &near];
        // with fetch_k = k = 1 only the most relevant candidate is considered
        assert_eq!(maximal_marginal_relevance(&q, &candidates, 1, 1, 0.0), vec![1]);
    }
}
