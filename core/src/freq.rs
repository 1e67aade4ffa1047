//! Frequency records and the score-value mapping.
//!
//! On disk a frequency record is 6 bytes: a 16-bit `language_id` followed by
//! a 32-bit word whose bit 0 is the stop-gram flag and whose bit 31 marks the
//! final record of its list. The remaining 30 bits are the `raw_score` key
//! into the [`ScoreTable`].
//!
//! In memory we do not keep the terminator bit around: `FrequencyPool`
//! records a `(start, len)` pair per trie leaf instead, and
//! `FrequencyList::iter` yields `(&FrequencyRecord, is_last)` to callers
//! that want that shape.

const STOP_BIT: u32 = 1;
const LAST_BIT: u32 = 1 << 31;
const SCORE_MASK: u32 = !(STOP_BIT | LAST_BIT);

/// Default stop-gram multiplier used until [`crate::identifier::Identifier::set_stop_gram_penalty`]
/// overrides it.
pub const DEFAULT_STOP_GRAM_PENALTY: f64 = -9.0;

/// The divisor every mapped score is normalised by.
pub const TRIE_SCALE_FACTOR: f64 = 1e9;
pub const SCORE_NORMALIZER: f64 = 100.0 * TRIE_SCALE_FACTOR;

/// One (language, score) contribution stored at a trie leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyRecord {
    pub language_id: u16,
    /// Already masked: stop-gram and list-terminator bits removed. This is
    /// the key used against [`ScoreTable`].
    pub raw_score: u32,
    pub stop: bool,
}

impl FrequencyRecord {
    /// Decode one 6-byte on-disk record. Returns the record plus whether it
    /// was flagged as the final record of its list.
    pub(crate) fn decode(language_id: u16, word: u32) -> (Self, bool) {
        let stop = word & STOP_BIT != 0;
        let last = word & LAST_BIT != 0;
        let raw_score = word & SCORE_MASK;
        (
            FrequencyRecord {
                language_id,
                raw_score,
                stop,
            },
            last,
        )
    }

    /// Encode back to the on-disk word, given whether this is the list's
    /// final record.
    pub(crate) fn encode(&self, last: bool) -> u32 {
        let mut word = self.raw_score & SCORE_MASK;
        if self.stop {
            word |= STOP_BIT;
        }
        if last {
            word |= LAST_BIT;
        }
        word
    }

    /// Effective score for this record: look the masked `raw_score` up in
    /// `table`, apply the stop-gram penalty if flagged, and normalise by
    /// [`SCORE_NORMALIZER`].
    pub fn effective_score(&self, table: &ScoreTable, stop_gram_penalty: f64) -> f64 {
        let mut value = table.get(self.raw_score);
        if self.stop {
            value *= stop_gram_penalty;
        }
        value / SCORE_NORMALIZER
    }
}

/// Contiguous pool backing every leaf's frequency list, plus the
/// `(language_id, score)` ordering invariant: within a list, non-stop
/// records precede stop records, and each sub-group is sorted by ascending
/// `language_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyPool {
    records: Vec<FrequencyRecord>,
}

/// A borrowed view of one leaf's frequency records.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyList<'a> {
    records: &'a [FrequencyRecord],
}

impl<'a> FrequencyList<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a FrequencyRecord, bool)> {
        let n = self.records.len();
        self.records
            .iter()
            .enumerate()
            .map(move |(i, r)| (r, i + 1 == n))
    }
}

impl<'a> IntoIterator for FrequencyList<'a> {
    type Item = &'a FrequencyRecord;
    type IntoIter = std::slice::Iter<'a, FrequencyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FrequencyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one leaf's records (already ordered: non-stop ascending by
    /// language id, then stop ascending by language id). Returns the
    /// `(start, len)` pair the owning trie node should store.
    pub fn push_list(&mut self, mut records: Vec<FrequencyRecord>) -> (u32, u16) {
        records.sort_by(|a, b| a.stop.cmp(&b.stop).then(a.language_id.cmp(&b.language_id)));
        let start = self.records.len() as u32;
        let len = records.len() as u16;
        self.records.extend(records);
        (start, len)
    }

    /// Rebuild a pool from records already in their final on-disk order
    /// (used by the codec reader, where each node's `freq_start`/`freq_len`
    /// already points at the position it was written at).
    pub fn from_raw(records: Vec<FrequencyRecord>) -> Self {
        FrequencyPool { records }
    }

    pub fn list(&self, start: u32, len: u16) -> FrequencyList<'_> {
        let start = start as usize;
        let end = start + len as usize;
        FrequencyList {
            records: &self.records[start..end],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn raw_records(&self) -> &[FrequencyRecord] {
        &self.records
    }
}

/// Process-wide monotone mapping from a masked `raw_score` to a double.
/// Built either from a default generator or replaced
/// wholesale by the table stored at the end of a model file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    values: Vec<f64>,
}

impl ScoreTable {
    /// A monotone default: `ln(raw_score + 1)`, scaled so it stays strictly
    /// increasing and positive across the range a builder is likely to
    /// produce. Used when a model file carries no explicit table.
    pub fn default_generator(max_raw_score: u32) -> Self {
        let len = max_raw_score as usize + 1;
        let values = (0..len).map(|i| ((i as f64) + 1.0).ln() + 1.0).collect();
        ScoreTable { values }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        ScoreTable { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up `raw_score` (already masked). Scores past the end of the
    /// table clamp to the last entry rather than panicking: a builder may
    /// see larger raw counts than the table it was handed was sized for.
    pub fn get(&self, raw_score: u32) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let idx = (raw_score as usize).min(self.values.len() - 1);
        self.values[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let rec = FrequencyRecord {
            language_id: 7,
            raw_score: 12345,
            stop: true,
        };
        let word = rec.encode(true);
        let (decoded, last) = FrequencyRecord::decode(rec.language_id, word);
        assert_eq!(decoded, rec);
        assert!(last);
    }

    #[test]
    fn encode_decode_not_last_not_stop() {
        let rec = FrequencyRecord {
            language_id: 3,
            raw_score: 99,
            stop: false,
        };
        let word = rec.encode(false);
        let (decoded, last) = FrequencyRecord::decode(rec.language_id, word);
        assert_eq!(decoded, rec);
        assert!(!last);
    }

    #[test]
    fn pool_sorts_non_stop_before_stop_by_language_id() {
        let mut pool = FrequencyPool::new();
        let records = vec![
            FrequencyRecord { language_id: 2, raw_score: 1, stop: true },
            FrequencyRecord { language_id: 1, raw_score: 1, stop: false },
            FrequencyRecord { language_id: 0, raw_score: 1, stop: true },
            FrequencyRecord { language_id: 0, raw_score: 1, stop: false },
        ];
        let (start, len) = pool.push_list(records);
        let list = pool.list(start, len);
        let ordered: Vec<_> = list.into_iter().collect();
        assert_eq!(ordered[0].language_id, 0);
        assert!(!ordered[0].stop);
        assert_eq!(ordered[1].language_id, 1);
        assert!(!ordered[1].stop);
        assert_eq!(ordered[2].language_id, 0);
        assert!(ordered[2].stop);
        assert_eq!(ordered[3].language_id, 2);
        assert!(ordered[3].stop);
    }

    #[test]
    fn frequency_list_iter_marks_last() {
        let mut pool = FrequencyPool::new();
        let records = vec![
            FrequencyRecord { language_id: 0, raw_score: 1, stop: false },
            FrequencyRecord { language_id: 1, raw_score: 1, stop: false },
        ];
        let (start, len) = pool.push_list(records);
        let list = pool.list(start, len);
        let flags: Vec<bool> = list.iter().map(|(_, last)| last).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn score_table_monotone_default() {
        let table = ScoreTable::default_generator(10);
        for i in 0..10 {
            assert!(table.get(i) < table.get(i + 1));
        }
        // clamps past the end
        assert_eq!(table.get(1000), table.get(10));
    }

    #[test]
    fn stop_gram_flips_sign_of_effective_score() {
        let table = ScoreTable::default_generator(100);
        let applying = FrequencyRecord { language_id: 0, raw_score: 50, stop: true };
        let not_applying = FrequencyRecord { language_id: 0, raw_score: 50, stop: false };
        let s_stop = applying.effective_score(&table, DEFAULT_STOP_GRAM_PENALTY);
        let s_plain = not_applying.effective_score(&table, DEFAULT_STOP_GRAM_PENALTY);
        assert!(s_stop < 0.0);
        assert!(s_plain > 0.0);
    }
}
