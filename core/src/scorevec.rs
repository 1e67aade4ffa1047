//! Score vectors: the `(language_id, score)` sequence every scoring pass
//! accumulates into and every post-processing step operates on.
//!
//! The accumulate/merge helpers below lean on a "two sorted lists, matching
//! keys get summed" shape, generalised from a single list to name-keyed
//! grouping for `merge_duplicate_names_and_sort`.

use crate::langid::LanguageTable;

/// Scores at or below this magnitude are treated as "no signal" by
/// `filter`/`lambda_combine_with_prior`.
pub const LANGID_ZERO_SCORE: f64 = 1e-9;

/// An ordered `(language_id, score)` sequence with a sortedness flag and an
/// "active language" slot used by the similarity pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector {
    entries: Vec<(u16, f64)>,
    sorted: bool,
    active_language: Option<u16>,
    max_languages: usize,
}

impl ScoreVector {
    /// A dense vector with one zeroed slot per language id `0..num_languages`.
    /// This is the shape the scoring engine accumulates into.
    pub fn zeroed(num_languages: usize) -> Self {
        let entries = (0..num_languages).map(|i| (i as u16, 0.0)).collect();
        ScoreVector {
            entries,
            sorted: false,
            active_language: None,
            max_languages: num_languages,
        }
    }

    /// An empty vector bounded to hold at most `max_languages` entries
    /// (used for vectors built up via `push`, e.g. similarity results).
    pub fn with_capacity(max_languages: usize) -> Self {
        ScoreVector {
            entries: Vec::with_capacity(max_languages),
            sorted: false,
            active_language: None,
            max_languages,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn max_languages(&self) -> usize {
        self.max_languages
    }

    pub fn entries(&self) -> &[(u16, f64)] {
        &self.entries
    }

    pub fn set_active_language(&mut self, lang: Option<u16>) {
        self.active_language = lang;
    }

    pub fn active_language(&self) -> Option<u16> {
        self.active_language
    }

    pub fn score_of(&self, lang_id: u16) -> Option<f64> {
        self.entries
            .iter()
            .find(|(id, _)| *id == lang_id)
            .map(|(_, s)| *s)
    }

    /// Overwrite the score at a given position (not a language id lookup).
    /// Used by post-processing passes that already hold an index from
    /// [`ScoreVector::entries`].
    pub fn set_score_at(&mut self, index: usize, score: f64) {
        if let Some(slot) = self.entries.get_mut(index) {
            slot.1 = score;
        }
        self.sorted = false;
    }

    pub fn push(&mut self, lang_id: u16, score: f64) {
        debug_assert!(self.entries.len() <= self.max_languages);
        self.entries.push((lang_id, score));
        self.sorted = false;
    }

    /// Add `delta` into the slot for `lang_id`. Requires the vector was
    /// built with [`ScoreVector::zeroed`] (dense, indexed by language id) —
    /// this is the engine's hot-path accumulate.
    #[inline]
    pub fn accumulate(&mut self, lang_id: u16, delta: f64) {
        if let Some(slot) = self.entries.get_mut(lang_id as usize) {
            if slot.0 == lang_id {
                slot.1 += delta;
                return;
            }
        }
        // Fallback for non-dense vectors: linear search.
        if let Some(slot) = self.entries.iter_mut().find(|(id, _)| *id == lang_id) {
            slot.1 += delta;
        }
    }

    /// Zero every score; does not change the set of language ids present.
    pub fn clear(&mut self) {
        for (_, s) in self.entries.iter_mut() {
            *s = 0.0;
        }
        self.sorted = false;
    }

    pub fn scale(&mut self, factor: f64) {
        for (_, s) in self.entries.iter_mut() {
            *s *= factor;
        }
    }

    pub fn sqrt(&mut self) {
        for (_, s) in self.entries.iter_mut() {
            *s = s.max(0.0).sqrt();
        }
    }

    /// `self[i] += w * other[i]` for matching language ids, bounded by
    /// `min(self.len(), other.len())`. Positions whose language
    /// id doesn't match between the two vectors are left untouched rather
    /// than guessed at.
    pub fn add(&mut self, other: &ScoreVector, weight: f64) {
        let n = self.entries.len().min(other.entries.len());
        for i in 0..n {
            if self.entries[i].0 == other.entries[i].0 {
                self.entries[i].1 += weight * other.entries[i].1;
            }
        }
        self.sorted = false;
    }

    pub fn sub(&mut self, other: &ScoreVector, weight: f64) {
        self.add(other, -weight);
    }

    /// Like [`ScoreVector::add`], but only applies where `other[i] > threshold`.
    pub fn add_thresholded(&mut self, other: &ScoreVector, threshold: f64, weight: f64) {
        let n = self.entries.len().min(other.entries.len());
        for i in 0..n {
            if self.entries[i].0 == other.entries[i].0 && other.entries[i].1 > threshold {
                self.entries[i].1 += weight * other.entries[i].1;
            }
        }
        self.sorted = false;
    }

    /// Deleted-interpolation-style combination with a prior vector: for
    /// every `i` whose current score is at least
    /// [`LANGID_ZERO_SCORE`], accumulate `prior[i] += cur * sigma`, then
    /// replace `cur` with `lambda*cur + (1-lambda)*prior[i]`.
    pub fn lambda_combine_with_prior(&mut self, prior: &mut ScoreVector, lambda: f64, sigma: f64) {
        let n = self.entries.len().min(prior.entries.len());
        for i in 0..n {
            if self.entries[i].0 != prior.entries[i].0 {
                continue;
            }
            let cur = self.entries[i].1;
            if cur >= LANGID_ZERO_SCORE {
                prior.entries[i].1 += cur * sigma;
            }
            self.entries[i].1 = lambda * cur + (1.0 - lambda) * prior.entries[i].1;
        }
        self.sorted = false;
    }

    /// Drop entries below `max(LANGID_ZERO_SCORE, ratio * highest)`. If that
    /// would drop everything, the single highest-scoring entry is retained
    /// instead.
    pub fn filter(&mut self, ratio: f64) {
        let highest = self
            .entries
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::MIN, f64::max);
        if !highest.is_finite() {
            return;
        }
        let threshold = (ratio * highest).max(LANGID_ZERO_SCORE);
        let kept: Vec<_> = self
            .entries
            .iter()
            .copied()
            .filter(|(_, s)| *s >= threshold)
            .collect();
        self.entries = if kept.is_empty() {
            self.entries
                .iter()
                .copied()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .into_iter()
                .collect()
        } else {
            kept
        };
    }

    /// Filter then sort descending by score.
    pub fn sort(&mut self, ratio: f64) {
        self.filter(ratio);
        self.entries
            .sort_by(|a, b| b.1.total_cmp(&a.1));
        self.sorted = true;
    }

    /// Like [`ScoreVector::sort`], but keeps only the top `k` (partial-sort
    /// semantics: everything past `k` is truncated, not merely hidden).
    pub fn sort_top_k(&mut self, ratio: f64, k: usize) {
        self.sort(ratio);
        self.entries.truncate(k);
    }

    /// Stable sort by the language's display name.
    pub fn sort_by_name(&mut self, metadata: &LanguageTable) {
        self.entries.sort_by(|a, b| {
            let na = metadata.get(a.0).map(|l| l.display_name()).unwrap_or("");
            let nb = metadata.get(b.0).map(|l| l.display_name()).unwrap_or("");
            na.cmp(nb)
        });
        self.sorted = false;
    }

    /// Sort by name, then fold adjacent entries whose language shares a
    /// display name, summing their scores.
    pub fn merge_duplicate_names_and_sort(&mut self, metadata: &LanguageTable) {
        self.sort_by_name(metadata);
        let mut merged: Vec<(u16, f64)> = Vec::with_capacity(self.entries.len());
        for &(id, score) in &self.entries {
            let name = metadata.get(id).map(|l| l.display_name());
            match merged.last_mut() {
                Some(&mut (last_id, ref mut last_score))
                    if metadata.get(last_id).map(|l| l.display_name()) == name =>
                {
                    *last_score += score;
                }
                _ => merged.push((id, score)),
            }
        }
        self.entries = merged;
        self.sorted = false;
    }

    /// Retain only the first occurrence of each `(language, encoding)` (or
    /// `(language, region, encoding)` when `ignore_region` is false) triple,
    /// in current vector order.
    pub fn filter_duplicates(&mut self, metadata: &LanguageTable, ignore_region: bool) {
        let mut seen: Vec<(String, String, String)> = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for &(id, score) in &self.entries {
            let Some(lang) = metadata.get(id) else {
                continue;
            };
            let region = if ignore_region {
                String::new()
            } else {
                lang.region.clone()
            };
            let key = (lang.language_code().to_string(), region, lang.encoding.clone());
            if !seen.contains(&key) {
                seen.push(key);
                kept.push((id, score));
            }
        }
        self.entries = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langid::LanguageId;

    fn table_with(names: &[&str]) -> LanguageTable {
        let mut t = LanguageTable::new();
        for n in names {
            t.push(LanguageId {
                id: 0,
                name: n.to_string(),
                region: String::new(),
                encoding: "UTF-8".to_string(),
                source: String::new(),
                script: "Latin".to_string(),
                alignment: 1,
                coverage_factor: 1.0,
                counted_coverage: 1.0,
                freq_coverage: 1.0,
                match_factor: 1.0,
                training_bytes: 0,
            });
        }
        t
    }

    #[test]
    fn accumulate_into_zeroed_vector() {
        let mut v = ScoreVector::zeroed(3);
        v.accumulate(1, 2.5);
        v.accumulate(1, 1.0);
        assert_eq!(v.score_of(1), Some(3.5));
        assert_eq!(v.score_of(0), Some(0.0));
    }

    #[test]
    fn filter_drops_below_ratio_of_highest() {
        let mut v = ScoreVector::with_capacity(2);
        v.push(0, 10.0);
        v.push(1, 0.02);
        let mut a = v.clone();
        a.filter(0.1);
        assert_eq!(a.len(), 1);

        let mut b = v.clone();
        b.filter(0.001);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn filter_keeps_single_max_if_all_below_threshold() {
        let mut v = ScoreVector::with_capacity(2);
        v.push(0, -5.0);
        v.push(1, -1.0);
        v.filter(0.5);
        assert_eq!(v.len(), 1);
        assert_eq!(v.entries()[0].0, 1);
    }

    #[test]
    fn sort_is_idempotent_and_descending() {
        let mut v = ScoreVector::with_capacity(3);
        v.push(0, 1.0);
        v.push(1, 5.0);
        v.push(2, 3.0);
        v.sort(0.0);
        let once = v.clone();
        v.sort(0.0);
        assert_eq!(v, once);
        let scores: Vec<f64> = v.entries().iter().map(|(_, s)| *s).collect();
        assert_eq!(scores, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn sort_top_k_truncates() {
        let mut v = ScoreVector::with_capacity(3);
        v.push(0, 1.0);
        v.push(1, 5.0);
        v.push(2, 3.0);
        v.sort_top_k(0.0, 2);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn merge_duplicate_names_sums_scores() {
        let t = table_with(&["English", "English", "French"]);
        let mut v = ScoreVector::with_capacity(3);
        v.push(0, 3.0);
        v.push(1, 2.0);
        v.push(2, 1.0);
        v.merge_duplicate_names_and_sort(&t);
        assert_eq!(v.len(), 2);
        let english = v
            .entries()
            .iter()
            .find(|(id, _)| t.get(*id).unwrap().display_name() == "English")
            .unwrap();
        assert_eq!(english.1, 5.0);
    }

    #[test]
    fn mismatched_lengths_truncate_rather_than_fail() {
        let mut a = ScoreVector::zeroed(3);
        let mut b = ScoreVector::zeroed(5);
        a.accumulate(0, 1.0);
        b.accumulate(0, 10.0);
        b.accumulate(1, 10.0);
        a.add(&b, 1.0);
        assert_eq!(a.score_of(0), Some(11.0));
        assert_eq!(a.len(), 3);
    }
}
