//! Model file codec: signature-checked binary reader/writer.
//!
//! Layout, in order:
//! 1. Signature, then a one-byte version.
//! 2. `u32` language count.
//! 3. `u8 have_bigrams`, then reserved header padding up to absolute byte
//!    96, where the back-patched score-table offset lives (see item 7),
//!    followed by further reserved padding before the per-language data
//!    begins.
//! 4. Per-language: five fixed 64-byte NUL-padded strings, `u64`
//!    training_bytes, `u8` alignment, three reserved bytes, four `u32`
//!    coverage fields each stored as `round(value / MAX * UINT32_MAX)`.
//! 5. The packed trie's own block (node pool, then its frequency pool).
//! 6. A `u32` sentinel `0xFFFFFFFF`.
//! 7. The score-value mapping table, whose starting file offset is
//!    back-patched into the fixed header slot at absolute byte 96.
//!
//! All integers are little-endian, manually encoded via `to_le_bytes` /
//! `from_le_bytes` — no `bincode`/`byteorder` dependency; the on-disk
//! structures here are controlled byte-for-byte rather than handed to a
//! serialization framework.
//!
//! The back-patch is done by buffering the whole file in memory and
//! overwriting the placeholder bytes before the final write (a
//! "placeholder + final overwrite" strategy) — this never seeks the actual
//! output stream, only an in-memory `Vec<u8>`.

use crate::error::{LangIdentError, Result};
use crate::freq::{FrequencyPool, FrequencyRecord, ScoreTable};
use crate::langid::{LanguageId, LanguageTable};
use crate::trie::{PackedTrie, TrieNode};

pub const SIGNATURE: &[u8] = b"Language Identification Database\r\n\x1A\x04\0";
pub const CURRENT_VERSION: u8 = 1;
pub const MIN_VERSION: u8 = 1;

const LANG_STRING_FIELD_LEN: usize = 64;
/// Fixed absolute file offset of the back-patched score-table offset slot.
const SCORE_TABLE_OFFSET_POS: usize = 96;
/// Zero padding written after the score-table offset slot, before the
/// per-language data begins.
const HEADER_TRAILING_PAD_LEN: usize = 55;
const TRIE_BLOCK_SENTINEL: u32 = 0xFFFF_FFFF;

const COVERAGE_FACTOR_MAX: f64 = 1.0;
const COUNTED_COVERAGE_MAX: f64 = 32.0;
const FREQ_COVERAGE_MAX: f64 = 100.0;
const MATCH_FACTOR_MAX: f64 = 16.0;

/// Everything a load produces.
pub struct LoadedModel {
    pub languages: LanguageTable,
    pub trie: PackedTrie,
    pub pool: FrequencyPool,
    pub score_table: ScoreTable,
    pub have_bigrams: bool,
}

// ---- writer -----------------------------------------------------------

/// Serialize a complete model to bytes.
pub fn write_model(
    languages: &LanguageTable,
    trie: &PackedTrie,
    pool: &FrequencyPool,
    score_table: &ScoreTable,
    have_bigrams: bool,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.push(CURRENT_VERSION);
    out.extend_from_slice(&(languages.len() as u32).to_le_bytes());
    out.push(have_bigrams as u8);

    // Reserved header padding up to the fixed score-table offset slot at
    // absolute byte `SCORE_TABLE_OFFSET_POS`, followed by further reserved
    // padding before the per-language data begins.
    assert!(
        out.len() <= SCORE_TABLE_OFFSET_POS,
        "header grew past the fixed score-table offset slot"
    );
    out.extend(std::iter::repeat(0u8).take(SCORE_TABLE_OFFSET_POS - out.len()));
    let score_offset_slot = out.len();
    out.extend(std::iter::repeat(0u8).take(8));
    out.extend(std::iter::repeat(0u8).take(HEADER_TRAILING_PAD_LEN));

    for lang in languages.iter() {
        write_fixed_string(&mut out, &lang.name);
        write_fixed_string(&mut out, &lang.region);
        write_fixed_string(&mut out, &lang.encoding);
        write_fixed_string(&mut out, &lang.source);
        write_fixed_string(&mut out, &lang.script);
        out.extend_from_slice(&lang.training_bytes.to_le_bytes());
        out.push(lang.alignment);
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&scale_to_u32(lang.coverage_factor, COVERAGE_FACTOR_MAX).to_le_bytes());
        out.extend_from_slice(&scale_to_u32(lang.counted_coverage, COUNTED_COVERAGE_MAX).to_le_bytes());
        out.extend_from_slice(&scale_to_u32(lang.freq_coverage, FREQ_COVERAGE_MAX).to_le_bytes());
        out.extend_from_slice(&scale_to_u32(lang.match_factor, MATCH_FACTOR_MAX).to_le_bytes());
    }

    write_trie_block(&mut out, trie, pool);
    out.extend_from_slice(&TRIE_BLOCK_SENTINEL.to_le_bytes());

    let score_table_offset = out.len() as u64;
    write_score_table(&mut out, score_table);

    out[score_offset_slot..score_offset_slot + 8].copy_from_slice(&score_table_offset.to_le_bytes());
    out
}

fn write_fixed_string(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(LANG_STRING_FIELD_LEN);
    out.extend_from_slice(&bytes[..n]);
    out.extend(std::iter::repeat(0u8).take(LANG_STRING_FIELD_LEN - n));
}

fn scale_to_u32(value: f64, max: f64) -> u32 {
    let clamped = value.clamp(0.0, max);
    ((clamped / max) * (u32::MAX as f64)).round() as u32
}

fn unscale_from_u32(raw: u32, max: f64) -> f64 {
    (raw as f64 / u32::MAX as f64) * max
}

fn write_trie_block(out: &mut Vec<u8>, trie: &PackedTrie, pool: &FrequencyPool) {
    out.push(trie.bits());
    out.extend_from_slice(&(trie.node_count() as u32).to_le_bytes());
    let slots = 1usize << trie.bits();
    for node in &trie.nodes {
        debug_assert_eq!(node.children.len(), slots);
        for &child in node.children.iter() {
            out.extend_from_slice(&child.to_le_bytes());
        }
        out.push(node.leaf as u8);
        out.extend_from_slice(&node.freq_start.to_le_bytes());
        out.extend_from_slice(&node.freq_len.to_le_bytes());
    }

    // Each node already carries an explicit freq_start/freq_len, so the
    // in-band `last` bit isn't load-bearing for decode; it's still written
    // as `false` uniformly to keep the on-disk word shape exactly the one
    // `FrequencyRecord::decode` expects.
    let records = pool.raw_records();
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for rec in records {
        out.extend_from_slice(&rec.language_id.to_le_bytes());
        out.extend_from_slice(&rec.encode(false).to_le_bytes());
    }
}

fn write_score_table(out: &mut Vec<u8>, table: &ScoreTable) {
    out.extend_from_slice(&(table.values().len() as u32).to_le_bytes());
    for &v in table.values() {
        out.extend_from_slice(&v.to_bits().to_le_bytes());
    }
}

// ---- reader -------------------------------------------------------------

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    path: String,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], path: &str) -> Self {
        ByteReader { data, pos: 0, path: path.to_string() }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(LangIdentError::TruncatedFile {
                path: self.path.clone(),
                detail: format!("expected {n} more bytes at offset {}", self.pos),
            });
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    fn fixed_string(&mut self) -> Result<String> {
        let raw = self.take(LANG_STRING_FIELD_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Take up to `n` bytes without failing if fewer remain; missing bytes
    /// are simply absent rather than erroring, so callers reading past the
    /// end get a short (possibly empty) slice.
    fn take_lenient(&mut self, n: usize) -> &'a [u8] {
        let avail = self.data.len().saturating_sub(self.pos);
        let n = n.min(avail);
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        s
    }

    /// Zero-defaulting counterpart to [`Self::u8`], used for per-language
    /// metadata fields that are allowed to be missing.
    fn u8_lenient(&mut self) -> u8 {
        self.take_lenient(1).first().copied().unwrap_or(0)
    }

    fn u32_lenient(&mut self) -> u32 {
        let raw = self.take_lenient(4);
        let mut buf = [0u8; 4];
        buf[..raw.len()].copy_from_slice(raw);
        u32::from_le_bytes(buf)
    }

    fn u64_lenient(&mut self) -> u64 {
        let raw = self.take_lenient(8);
        let mut buf = [0u8; 8];
        buf[..raw.len()].copy_from_slice(raw);
        u64::from_le_bytes(buf)
    }

    fn fixed_string_lenient(&mut self) -> String {
        let raw = self.take_lenient(LANG_STRING_FIELD_LEN);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }
}

/// Parse a complete model from `bytes`. `path` is used only for error
/// messages.
pub fn read_model(bytes: &[u8], path: &str) -> Result<LoadedModel> {
    let mut r = ByteReader::new(bytes, path);

    let sig = r.take(SIGNATURE.len())?;
    if sig != SIGNATURE {
        return Err(LangIdentError::BadSignature { path: path.to_string() });
    }
    let version = r.u8()?;
    if version < MIN_VERSION {
        return Err(LangIdentError::UnsupportedVersion {
            path: path.to_string(),
            found: version,
            min: MIN_VERSION,
        });
    }

    let num_languages = r.u32()?;
    let have_bigrams = r.u8()? != 0;
    // skip reserved padding up to the fixed score-table offset slot
    r.take(SCORE_TABLE_OFFSET_POS - r.pos)?;
    let score_table_offset = r.u64()?;
    // consume the trailing reserved padding after the slot
    r.take(HEADER_TRAILING_PAD_LEN)?;

    // Per-language metadata fields default to zero when truncated rather
    // than failing the whole load; only the trie block below is fatal.
    let mut languages = LanguageTable::new();
    for _ in 0..num_languages {
        let name = r.fixed_string_lenient();
        let region = r.fixed_string_lenient();
        let encoding = r.fixed_string_lenient();
        let source = r.fixed_string_lenient();
        let script = r.fixed_string_lenient();
        let training_bytes = r.u64_lenient();
        let alignment = r.u8_lenient();
        r.take_lenient(3);
        let coverage_factor = unscale_from_u32(r.u32_lenient(), COVERAGE_FACTOR_MAX);
        let counted_coverage = unscale_from_u32(r.u32_lenient(), COUNTED_COVERAGE_MAX);
        let freq_coverage = unscale_from_u32(r.u32_lenient(), FREQ_COVERAGE_MAX);
        let match_factor = unscale_from_u32(r.u32_lenient(), MATCH_FACTOR_MAX);
        languages.push(LanguageId {
            id: 0,
            name,
            region,
            encoding,
            source,
            script,
            alignment,
            coverage_factor,
            counted_coverage,
            freq_coverage,
            match_factor,
            training_bytes,
        });
    }

    let (trie, pool) = read_trie_block(&mut r)?;

    let sentinel = r.u32()?;
    if sentinel != TRIE_BLOCK_SENTINEL {
        return Err(LangIdentError::Corruption {
            path: path.to_string(),
            detail: format!("expected trie-block sentinel, found 0x{sentinel:08X}"),
        });
    }

    // The score table is read from its back-patched offset rather than
    // trusting the cursor position, so a reader can seek straight to it.
    let mut table_reader = ByteReader::new(bytes, path);
    table_reader.pos = score_table_offset as usize;
    let score_table = read_score_table(&mut table_reader)?;

    Ok(LoadedModel { languages, trie, pool, score_table, have_bigrams })
}

fn read_trie_block(r: &mut ByteReader<'_>) -> Result<(PackedTrie, FrequencyPool)> {
    let bits = r.u8()?;
    if !(2..=4).contains(&bits) {
        return Err(LangIdentError::Corruption {
            path: r.path.clone(),
            detail: format!("trie bit width {bits} out of range 2..=4"),
        });
    }
    let slots = 1usize << bits;
    let node_count = r.u32()? as usize;

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let mut children = Vec::with_capacity(slots);
        for _ in 0..slots {
            children.push(r.u32()?);
        }
        let leaf = r.u8()? != 0;
        let freq_start = r.u32()?;
        let freq_len = r.u16()?;
        nodes.push(TrieNode {
            children: children.into_boxed_slice(),
            leaf,
            freq_start,
            freq_len,
        });
    }
    if nodes.is_empty() {
        return Err(LangIdentError::Corruption {
            path: r.path.clone(),
            detail: "trie block has zero nodes; node 0 (root) must exist".to_string(),
        });
    }

    let record_count = r.u32()? as usize;
    let mut records = Vec::with_capacity(record_count);
    for _ in 0..record_count {
        let language_id = r.u16()?;
        let word = r.u32()?;
        let (rec, _last) = FrequencyRecord::decode(language_id, word);
        records.push(rec);
    }

    let trie = PackedTrie::new(bits, nodes);
    // Each node's freq_start/freq_len already points at this exact
    // write-order position, so the pool is rebuilt verbatim rather than
    // re-grouped through `FrequencyPool::push_list`.
    let pool = FrequencyPool::from_raw(records);
    Ok((trie, pool))
}

fn read_score_table(r: &mut ByteReader<'_>) -> Result<ScoreTable> {
    let count = r.u32()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(r.f64()?);
    }
    Ok(ScoreTable::from_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TrieBuilder;

    fn sample_language(name: &str) -> LanguageId {
        LanguageId {
            id: 0,
            name: name.to_string(),
            region: "US".to_string(),
            encoding: "UTF-8".to_string(),
            source: "test".to_string(),
            script: "Latin".to_string(),
            alignment: 1,
            coverage_factor: 0.9,
            counted_coverage: 12.0,
            freq_coverage: 88.0,
            match_factor: 4.0,
            training_bytes: 123_456,
        }
    }

    #[test]
    fn round_trips_languages_and_trie() {
        let mut languages = LanguageTable::new();
        languages.push(sample_language("en=English"));
        languages.push(sample_language("fr=French"));

        let mut builder = TrieBuilder::new(4);
        builder.insert(b"the", 0, 800, false);
        builder.insert(b"les", 1, 700, false);
        let (trie, pool) = builder.compact();
        let score_table = ScoreTable::default_generator(1000);

        let bytes = write_model(&languages, &trie, &pool, &score_table, true);
        let loaded = read_model(&bytes, "test.db").unwrap();

        assert_eq!(loaded.languages.len(), 2);
        assert_eq!(loaded.languages.get(0).unwrap().name, "en=English");
        assert_eq!(loaded.languages.get(1).unwrap().training_bytes, 123_456);
        assert_eq!(loaded.trie.node_count(), trie.node_count());
        assert_eq!(loaded.score_table.values().len(), score_table.values().len());

        let node = loaded.trie.extend(loaded.trie.root(), b't', false);
        assert_ne!(node, crate::trie::NULL_INDEX);
    }

    #[test]
    fn rejects_bad_signature() {
        let bytes = vec![0u8; 200];
        let err = read_model(&bytes, "bogus.db").unwrap_err();
        assert!(matches!(err, LangIdentError::BadSignature { .. }));
    }

    #[test]
    fn rejects_truncated_trie_block() {
        let mut languages = LanguageTable::new();
        languages.push(sample_language("en"));
        let mut builder = TrieBuilder::new(4);
        builder.insert(b"x", 0, 1, false);
        let (trie, pool) = builder.compact();
        let score_table = ScoreTable::default_generator(10);
        let mut bytes = write_model(&languages, &trie, &pool, &score_table, false);
        bytes.truncate(bytes.len() - 40);
        let err = read_model(&bytes, "short.db");
        assert!(err.is_err());
    }

    #[test]
    fn coverage_scaling_round_trips_within_quantization_error() {
        let raw = scale_to_u32(0.9, 1.0);
        let back = unscale_from_u32(raw, 1.0);
        assert!((back - 0.9).abs() < 1e-6);
    }

    #[test]
    fn lenient_reads_zero_default_past_end_of_buffer() {
        let data = [1u8, 2, 3];
        let mut r = ByteReader::new(&data, "t");
        assert_eq!(r.u32_lenient(), u32::from_le_bytes([1, 2, 3, 0]));
        assert_eq!(r.u8_lenient(), 0);
        assert_eq!(r.u64_lenient(), 0);
        assert_eq!(r.fixed_string_lenient(), String::new());
    }

    #[test]
    fn score_table_offset_slot_sits_at_fixed_absolute_position() {
        let mut languages = LanguageTable::new();
        languages.push(sample_language("en"));
        let mut builder = TrieBuilder::new(4);
        builder.insert(b"x", 0, 1, false);
        let (trie, pool) = builder.compact();
        let score_table = ScoreTable::default_generator(10);
        let bytes = write_model(&languages, &trie, &pool, &score_table, false);

        let offset = u64::from_le_bytes(
            bytes[SCORE_TABLE_OFFSET_POS..SCORE_TABLE_OFFSET_POS + 8]
                .try_into()
                .unwrap(),
        );
        assert!(offset as usize > SCORE_TABLE_OFFSET_POS);
        assert!((offset as usize) < bytes.len());
    }
}
