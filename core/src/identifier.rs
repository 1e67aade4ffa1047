//! The `Identifier` facade: owns a loaded model and exposes the consumer
//! API a CLI or library caller actually drives.
//!
//! Bundles the trie, frequency pool, score table, and language metadata
//! together with a small config, the way a single owning struct typically
//! pairs trained data with the knobs a caller tunes at runtime.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::codec::{self, LoadedModel};
use crate::config::EngineConfig;
use crate::error::{LangIdentError, Result};
use crate::freq::{FrequencyPool, ScoreTable};
use crate::langid::{LanguageId, LanguageTable, UNKNOWN_LANGUAGE};
use crate::scorevec::ScoreVector;
use crate::scoring::{self, ScoringOptions};
use crate::similarity;
use crate::trie::PackedTrie;

/// Weight applied to a bigram-length match when the model declares
/// `have_bigrams`; `length_factors[2]` is `0.0` otherwise, which is what
/// drives the hot loop's `minhist` choice.
const BIGRAM_WEIGHT_DEFAULT: f64 = 0.15;

/// Generous upper bound on n-gram length the derived `length_factors`
/// table is built for, covering `k` in `[0, longest_ngram]`. Rather than
/// recover the model's exact longest n-gram from the packed trie, every
/// entry up to this bound is precomputed — indices the trie can never
/// actually reach during a walk are simply never looked up (see
/// DESIGN.md).
const LENGTH_FACTOR_CAP: usize = 32;

pub struct Identifier {
    languages: LanguageTable,
    trie: PackedTrie,
    pool: FrequencyPool,
    score_table: ScoreTable,
    alignments: Vec<u8>,
    unaligned: Vec<u8>,
    adjustments: Vec<f64>,
    length_factors: Vec<f64>,
    have_bigrams: bool,
    bigram_weight: f64,
    config: EngineConfig,
}

impl Identifier {
    /// Load a model database from `database_path`.
    ///
    /// `charset_path` is accepted for interface parity with the external
    /// character-set-name-to-script heuristic but is not read. When
    /// `create` is set and the path does not exist, an empty identifier
    /// (zero languages) is returned instead of an error.
    pub fn load(
        database_path: impl AsRef<Path>,
        _charset_path: Option<&Path>,
        create: bool,
        verbose: bool,
    ) -> Result<Self> {
        let path = resolve_database_path(database_path.as_ref());
        if verbose {
            info!("loading language database from {}", path.display());
        }

        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if create && e.kind() == std::io::ErrorKind::NotFound => {
                warn!("database {} not found; starting empty (create=true)", path.display());
                return Ok(Self::empty());
            }
            Err(e) => return Err(LangIdentError::Io(e)),
        };

        let path_str = path.to_string_lossy().into_owned();
        let LoadedModel { languages, trie, pool, score_table, have_bigrams } =
            codec::read_model(&bytes, &path_str)?;

        if verbose {
            info!("loaded {} languages", languages.len());
        }

        Ok(Self::from_parts(languages, trie, pool, score_table, have_bigrams))
    }

    /// An identifier with no trained languages at all. A failed load that
    /// tolerates `create` leaves the identifier empty rather than absent.
    pub fn empty() -> Self {
        Self::from_parts(
            LanguageTable::new(),
            PackedTrie::new(4, vec![crate::trie::TrieNode::empty(16)]),
            FrequencyPool::new(),
            ScoreTable::default_generator(0),
            false,
        )
    }

    fn from_parts(
        languages: LanguageTable,
        trie: PackedTrie,
        pool: FrequencyPool,
        score_table: ScoreTable,
        have_bigrams: bool,
    ) -> Self {
        let n = languages.len();
        let alignments: Vec<u8> = languages.iter().map(|l| l.alignment).collect();
        let unaligned = vec![1u8; n];
        let config = EngineConfig::default();
        let adjustments: Vec<f64> = languages
            .iter()
            .map(|l| l.adjustment(config.coverage_basis))
            .collect();
        let bigram_weight = BIGRAM_WEIGHT_DEFAULT;
        let length_factors = build_length_factors(LENGTH_FACTOR_CAP, have_bigrams, bigram_weight);

        Identifier {
            languages,
            trie,
            pool,
            score_table,
            alignments,
            unaligned,
            adjustments,
            length_factors,
            have_bigrams,
            bigram_weight,
            config,
        }
    }

    /// Serialize this identifier's model back to a database file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = codec::write_model(&self.languages, &self.trie, &self.pool, &self.score_table, self.have_bigrams);
        std::fs::write(path, bytes).map_err(LangIdentError::Io)
    }

    /// Override the bigram-length weight (the `b<n>` half of the CLI's
    /// `b<n>,s<n>` weight specifier), recomputing `length_factors[2]`.
    /// A no-op on a model with `have_bigrams == false`,
    /// since `minhist` already forces trigram-or-longer matching for those.
    pub fn set_bigram_weight(&mut self, weight: f64) {
        self.bigram_weight = weight;
        self.length_factors = build_length_factors(LENGTH_FACTOR_CAP, self.have_bigrams, weight);
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageId> {
        self.languages.iter()
    }

    /// The full language metadata table, e.g. for
    /// [`ScoreVector::merge_duplicate_names_and_sort`] or
    /// [`ScoreVector::filter_duplicates`] in a caller's post-processing.
    pub fn language_table(&self) -> &LanguageTable {
        &self.languages
    }

    pub fn language_id(&self, code: &str) -> u16 {
        self.languages.id_of(code)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Process-wide (here: per-identifier) stop-gram penalty override.
    pub fn set_stop_gram_penalty(&mut self, penalty: f64) {
        self.config.set_stop_gram_penalty(penalty);
    }

    /// Recompute `adjustments` after switching the coverage basis.
    pub fn set_coverage_basis(&mut self, basis: crate::langid::CoverageBasis) {
        self.config.coverage_basis = basis;
        self.adjustments = self
            .languages
            .iter()
            .map(|l| l.adjustment(basis))
            .collect();
    }

    /// Score `buf` against every trained language.
    pub fn identify(&self, buf: &[u8], options: ScoringOptions) -> ScoreVector {
        let mut scores = ScoreVector::zeroed(self.languages.len());
        let alignments = if options.enforce_alignment {
            &self.alignments
        } else {
            &self.unaligned
        };
        scoring::score_buffer(
            buf,
            &self.trie,
            &self.pool,
            &self.score_table,
            alignments,
            &self.length_factors,
            self.config.stop_gram_penalty(),
            options,
            None,
            &mut scores,
        );
        scores
    }

    /// Score using this identifier's current [`EngineConfig`] flags.
    pub fn identify_with_config(&self, buf: &[u8]) -> ScoreVector {
        self.identify(buf, self.config.scoring_options())
    }

    /// Post-process raw scores: optionally apply the coverage adjustment,
    /// then sort/cutoff to `top_n`.
    pub fn finish(&self, mut scores: ScoreVector, top_n: usize, cutoff_ratio: f64) -> ScoreVector {
        if self.config.apply_coverage {
            for i in 0..scores.len() {
                let (lang_id, score) = scores.entries()[i];
                if let Some(adj) = self.adjustments.get(lang_id as usize) {
                    let scaled = score * adj;
                    scores.set_score_at(i, scaled);
                }
            }
        }
        if top_n > 0 {
            scores.sort_top_k(cutoff_ratio, top_n);
        } else {
            scores.sort(cutoff_ratio);
        }
        scores
    }

    /// Cosine similarity of every language against `pivot`. Returns a
    /// vector whose entry for `UNKNOWN_LANGUAGE`
    /// lookups would be meaningless; callers are expected to pass a valid
    /// id from [`Identifier::language_id`].
    pub fn similarity(&self, pivot: u16) -> ScoreVector {
        if pivot == UNKNOWN_LANGUAGE {
            return ScoreVector::with_capacity(0);
        }
        similarity::similarity(&self.trie, &self.pool, &self.score_table, self.languages.len(), pivot)
    }
}

fn build_length_factors(cap: usize, have_bigrams: bool, bigram_weight: f64) -> Vec<f64> {
    let mut v = vec![0.0f64; cap + 1];
    if cap >= 1 {
        v[1] = 1.0;
    }
    if cap >= 2 {
        v[2] = if have_bigrams {
            bigram_weight * 270.0 * 2f64.powf(0.75)
        } else {
            0.0
        };
    }
    for k in 3..v.len() {
        v[k] = 270.0 * (k as f64).powf(0.75);
    }
    v
}

/// Expand a leading `~/` using `HOME` (falling back to a `USER`-derived
/// guess only if `HOME` is unset), then apply the fallback search order:
/// given path → `./languages.db` → `~/.langident/languages.db` →
/// `/usr/share/langident/languages.db`.
fn resolve_database_path(given: &Path) -> PathBuf {
    let expanded = expand_home(given);
    if expanded.exists() {
        return expanded;
    }
    let candidates = [
        PathBuf::from("./languages.db"),
        home_dir().map(|h| h.join(".langident/languages.db")).unwrap_or_default(),
        PathBuf::from("/usr/share/langident/languages.db"),
    ];
    for candidate in candidates {
        if !candidate.as_os_str().is_empty() && candidate.exists() {
            return candidate;
        }
    }
    expanded
}

fn expand_home(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USER").map(|u| PathBuf::from("/home").join(u)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TrieBuilder;
    use crate::langid::CoverageBasis;

    fn sample_identifier() -> Identifier {
        let mut languages = LanguageTable::new();
        languages.push(LanguageId {
            id: 0,
            name: "en".to_string(),
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
        languages.push(LanguageId {
            id: 0,
            name: "fr".to_string(),
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
        let mut b = TrieBuilder::new(4);
        b.insert(b"the", 0, 2, false);
        b.insert(b"les", 1, 1, false);
        let (trie, pool) = b.compact();
        let score_table = ScoreTable::from_values(vec![0.0, 0.7, 0.8]);
        Identifier::from_parts(languages, trie, pool, score_table, true)
    }

    #[test]
    fn identify_prefers_matching_language() {
        let id = sample_identifier();
        let scores = id.identify_with_config(b"the");
        assert!(scores.score_of(0).unwrap() > scores.score_of(1).unwrap());
    }

    #[test]
    fn finish_applies_coverage_and_sorts() {
        let mut id = sample_identifier();
        id.set_coverage_basis(CoverageBasis::MatchFactor);
        let scores = id.identify_with_config(b"the");
        let finished = id.finish(scores, 1, 0.0);
        assert_eq!(finished.len(), 1);
    }

    #[test]
    fn empty_identifier_has_no_languages() {
        let id = Identifier::empty();
        assert_eq!(id.languages().count(), 0);
    }

    #[test]
    fn unknown_pivot_yields_empty_similarity() {
        let id = sample_identifier();
        let sv = id.similarity(UNKNOWN_LANGUAGE);
        assert!(sv.is_empty());
    }
}
