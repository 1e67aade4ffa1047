//! Cosine similarity between a pivot language and every other trained
//! language.
//!
//! Only the per-pivot pass is implemented; a bulk all-pairs precomputation
//! is left unbuilt (see DESIGN.md).

use crate::freq::{FrequencyPool, ScoreTable};
use crate::scorevec::ScoreVector;
use crate::trie::PackedTrie;

/// Cosine similarity of every language's non-stop-gram score profile
/// against `pivot`, over every leaf in `trie`.
///
/// For each leaf, every non-stop record contributes its mapped score `p`.
/// If the same leaf also carries a non-stop record for `pivot` (`p1`),
/// every other language `L2` present accumulates `weight[L2] += p2^2` and
/// `score[L2] += p1*p2`. The final pass normalises by
/// `sqrt(weight[L2]) * sqrt(weight[pivot])`.
pub fn similarity(
    trie: &PackedTrie,
    pool: &FrequencyPool,
    score_table: &ScoreTable,
    num_languages: usize,
    pivot: u16,
) -> ScoreVector {
    let mut weight = vec![0.0f64; num_languages];
    let mut score = vec![0.0f64; num_languages];

    for leaf in trie.leaves() {
        let Some((start, len)) = trie.freq_slice(leaf) else {
            continue;
        };
        let list = pool.list(start, len);

        let p1 = list
            .into_iter()
            .find(|r| r.language_id == pivot && !r.stop)
            .map(|r| r.effective_score(score_table, 1.0));

        for rec in list.into_iter() {
            if rec.stop {
                continue;
            }
            let p2 = rec.effective_score(score_table, 1.0);
            if let Some(slot) = weight.get_mut(rec.language_id as usize) {
                *slot += p2 * p2;
            }
            if let Some(p1) = p1 {
                if let Some(slot) = score.get_mut(rec.language_id as usize) {
                    *slot += p1 * p2;
                }
            }
        }
    }

    for w in weight.iter_mut() {
        *w = w.sqrt();
    }

    let pivot_weight = weight.get(pivot as usize).copied().unwrap_or(0.0);
    let mut out = ScoreVector::with_capacity(num_languages);
    for lang in 0..num_languages {
        let denom = weight[lang] * pivot_weight;
        let value = if denom > 0.0 { score[lang] / denom } else { 0.0 };
        out.push(lang as u16, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TrieBuilder;

    #[test]
    fn identical_profile_is_maximally_similar() {
        let table = ScoreTable::from_values(vec![0.0, 1.0, 2.0]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"aaa", 0, 2, false);
        b.insert(b"aaa", 1, 2, false);
        b.insert(b"bbb", 0, 1, false);
        b.insert(b"bbb", 1, 1, false);
        let (trie, pool) = b.compact();

        let sv = similarity(&trie, &pool, &table, 2, 0);
        let self_sim = sv.score_of(0).unwrap();
        let other_sim = sv.score_of(1).unwrap();
        assert!((self_sim - 1.0).abs() < 1e-9);
        assert!((other_sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_profiles_have_zero_similarity() {
        let table = ScoreTable::from_values(vec![0.0, 1.0]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"aaa", 0, 1, false);
        b.insert(b"bbb", 1, 1, false);
        let (trie, pool) = b.compact();

        let sv = similarity(&trie, &pool, &table, 2, 0);
        assert_eq!(sv.score_of(1), Some(0.0));
    }

    #[test]
    fn stop_grams_are_excluded_from_the_profile() {
        let table = ScoreTable::from_values(vec![0.0, 1.0]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"aaa", 0, 1, true);
        b.insert(b"aaa", 1, 1, false);
        let (trie, pool) = b.compact();

        let sv = similarity(&trie, &pool, &table, 2, 0);
        // pivot 0's only record at this leaf is a stop-gram, so p1 is None
        // and nothing accumulates into score[1].
        assert_eq!(sv.score_of(1), Some(0.0));
    }
}
