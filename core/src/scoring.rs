//! The scoring engine: slides a trie walker across a buffer and emits
//! per-language contributions into a [`ScoreVector`] (the hot loop).
//!
//! Written as flat `for`/`continue`/`break` control flow rather than
//! iterator chains, since the hot path wants to stay branch-predictable.

use crate::freq::ScoreTable;
use crate::scorevec::ScoreVector;
use crate::trie::{NodeIndex, PackedTrie, NULL_INDEX};

/// Start positions whose low two bits are 0,1,2,3 permit alignments up to
/// 4,1,2,1 respectively.
const MAX_ALIGN_BY_START_MOD4: [u8; 4] = [4, 1, 2, 1];

/// Per-call knobs threaded through from [`crate::identifier::Identifier::identify`].
#[derive(Debug, Clone, Copy)]
pub struct ScoringOptions {
    pub ignore_whitespace: bool,
    pub apply_stop_grams: bool,
    pub enforce_alignment: bool,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        ScoringOptions {
            ignore_whitespace: false,
            apply_stop_grams: true,
            enforce_alignment: true,
        }
    }
}

/// Score `buf` against `trie`, accumulating into `out` (expected to already
/// be zeroed and sized to the number of languages — see
/// [`ScoreVector::zeroed`]).
///
/// `alignments` is indexed by `language_id` and gives each language's
/// minimum legal start-offset modulus (`alignments[id]`, or the
/// all-ones `unaligned` table when `enforce_alignment` is off — the caller
/// picks which to pass). `length_factors[k]` gives the super-linear weight
/// for a match of length `k`. `length_normalizer` defaults to `buf.len()`
/// when `None`.
#[allow(clippy::too_many_arguments)]
pub fn score_buffer(
    buf: &[u8],
    trie: &PackedTrie,
    pool: &crate::freq::FrequencyPool,
    score_table: &ScoreTable,
    alignments: &[u8],
    length_factors: &[f64],
    stop_gram_penalty: f64,
    options: ScoringOptions,
    length_normalizer: Option<usize>,
    out: &mut ScoreVector,
) {
    let l = buf.len();
    let normalizer = length_normalizer.unwrap_or(l).max(1) as f64;

    let minhist: usize = if length_factors.get(2).copied().unwrap_or(0.0) != 0.0 {
        1
    } else {
        2
    };
    if l < minhist + 1 {
        return;
    }

    for start in 0..=(l - minhist - 1) {
        let mut node = trie.extend(trie.root(), buf[start], options.ignore_whitespace);
        if node == NULL_INDEX {
            continue;
        }
        if minhist == 2 {
            node = trie.extend(node, buf[start + 1], options.ignore_whitespace);
            if node == NULL_INDEX {
                continue;
            }
        }
        let max_align = MAX_ALIGN_BY_START_MOD4[start & 3];
        walk_from(
            trie,
            pool,
            score_table,
            alignments,
            length_factors,
            stop_gram_penalty,
            options,
            buf,
            start,
            minhist,
            max_align,
            normalizer,
            node,
            out,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_from(
    trie: &PackedTrie,
    pool: &crate::freq::FrequencyPool,
    score_table: &ScoreTable,
    alignments: &[u8],
    length_factors: &[f64],
    stop_gram_penalty: f64,
    options: ScoringOptions,
    buf: &[u8],
    start: usize,
    minhist: usize,
    max_align: u8,
    normalizer: f64,
    start_node: NodeIndex,
    out: &mut ScoreVector,
) {
    let mut node = start_node;
    for j in (start + minhist)..buf.len() {
        node = trie.extend(node, buf[j], options.ignore_whitespace);
        if node == NULL_INDEX {
            break;
        }
        if trie.is_leaf(node) {
            let match_len = j - start + 1;
            let factor = length_factors.get(match_len).copied().unwrap_or(0.0) / normalizer;
            if let Some((fstart, flen)) = trie.freq_slice(node) {
                for (f, _is_last) in pool.list(fstart, flen).iter() {
                    // ids past the alignments table's end are sentinelled to
                    // u8::MAX so the `lang_align > max_align` check below
                    // fails closed rather than needing a bounds branch.
                    let lang_align = alignments.get(f.language_id as usize).copied().unwrap_or(u8::MAX);
                    if lang_align > max_align {
                        continue;
                    }
                    let s = f.effective_score(score_table, stop_gram_penalty);
                    if !options.apply_stop_grams && s <= 0.0 {
                        // frequency lists are non-stop-first; once a
                        // non-positive score is reached with stop-grams
                        // disabled, everything after it in this list is a
                        // stop-gram too.
                        break;
                    }
                    out.accumulate(f.language_id, s * factor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TrieBuilder;

    fn length_factors(longest: usize, bigram_weight: f64) -> Vec<f64> {
        let mut v = vec![0.0; longest + 1];
        if v.len() > 1 {
            v[1] = 1.0;
        }
        if v.len() > 2 {
            v[2] = bigram_weight * 270.0 * 2f64.powf(0.75);
        }
        for k in 3..v.len() {
            v[k] = 270.0 * (k as f64).powf(0.75);
        }
        v
    }

    #[test]
    fn s1_trivial_trigram_scoring() {
        // en-trigram "the" -> raw score chosen so the mapped value is 0.8
        // before normalisation; fr-trigram "les" similarly at 0.7.
        let table = ScoreTable::from_values(vec![0.0, 0.7, 0.8]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"the", 0, 2, false); // -> table[2] = 0.8
        b.insert(b"les", 1, 1, false); // -> table[1] = 0.7
        let (trie, pool) = b.compact();

        let alignments = vec![1u8, 1u8];
        let lf = length_factors(3, 0.15);
        let mut scores = ScoreVector::zeroed(2);
        score_buffer(
            b"the",
            &trie,
            &pool,
            &table,
            &alignments,
            &lf,
            -9.0,
            ScoringOptions::default(),
            None,
            &mut scores,
        );

        let en = scores.score_of(0).unwrap();
        let fr = scores.score_of(1).unwrap();
        assert!(en > fr, "en={en} fr={fr}");
        let expected = 0.8 * 270.0 * 3f64.powf(0.75) / 3.0 / (100.0 * 1e9);
        assert!((en - expected).abs() < 1e-9, "en={en} expected={expected}");
    }

    #[test]
    fn s2_bigram_tie_break() {
        let table = ScoreTable::from_values(vec![0.0, 0.5]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"he", 0, 1, false);
        b.insert(b"es", 1, 1, false);
        let (trie, pool) = b.compact();

        let alignments = vec![1u8, 1u8];
        let lf = length_factors(2, 0.15);
        let mut scores_he = ScoreVector::zeroed(2);
        score_buffer(
            b"he", &trie, &pool, &table, &alignments, &lf, -9.0,
            ScoringOptions::default(), None, &mut scores_he,
        );
        let en = scores_he.score_of(0).unwrap();
        let fr = scores_he.score_of(1).unwrap();
        assert!(en > fr + crate::scorevec::LANGID_ZERO_SCORE);
    }

    #[test]
    fn s3_alignment_blocks_misaligned_match() {
        let table = ScoreTable::from_values(vec![0.0, 1.0]);
        let mut b = TrieBuilder::new(4);
        // language A: alignment 2; language B: alignment 1, same 4-gram.
        b.insert(b"\x00a\x00b", 0, 1, false);
        b.insert(b"\x00a\x00b", 1, 1, false);
        let (trie, pool) = b.compact();

        let alignments = vec![2u8, 1u8];
        let lf = length_factors(4, 0.15);
        let buf = b"x\x00a\x00b";
        let mut scores = ScoreVector::zeroed(2);
        score_buffer(
            buf, &trie, &pool, &table, &alignments, &lf, -9.0,
            ScoringOptions::default(), None, &mut scores,
        );
        assert_eq!(scores.score_of(0), Some(0.0), "A must receive zero: misaligned start");
        assert!(scores.score_of(1).unwrap() > 0.0, "B is alignment-1, matches regardless of offset");
    }

    #[test]
    fn s4_stop_gram_penalty_sign() {
        let table = ScoreTable::from_values(vec![0.0, 1.0]);
        let mut b = TrieBuilder::new(4);
        b.insert(b"bad", 2, 1, true);
        let (trie, pool) = b.compact();
        let alignments = vec![1u8, 1u8, 1u8];
        let lf = length_factors(3, 0.15);

        let mut applying = ScoreVector::zeroed(3);
        score_buffer(
            b"bad", &trie, &pool, &table, &alignments, &lf, -9.0,
            ScoringOptions { apply_stop_grams: true, ..Default::default() },
            None, &mut applying,
        );
        assert!(applying.score_of(2).unwrap() <= 0.0);

        let mut not_applying = ScoreVector::zeroed(3);
        score_buffer(
            b"bad", &trie, &pool, &table, &alignments, &lf, -9.0,
            ScoringOptions { apply_stop_grams: false, ..Default::default() },
            None, &mut not_applying,
        );
        assert_eq!(not_applying.score_of(2), Some(0.0));
    }
}
