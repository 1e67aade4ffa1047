//! Per-language metadata table.
//!
//! One [`LanguageId`] record per trained language. Indices into the table
//! double as the `language_id` stored in every [`crate::freq::FrequencyRecord`],
//! so the table's order is load-bearing: it must match the order the model
//! file was written in.

/// Reserved id meaning "no such language".
///
/// Lookups that would otherwise fail return this instead of an error; it is
/// deliberately all-ones so it sorts last and never aliases a real language.
pub const UNKNOWN_LANGUAGE: u16 = u16::MAX;

/// Which per-language statistic `adjustments[id]` is computed from. The
/// default always used `match_factor`; the alternatives are kept as a
/// documented, inert choice rather than silently dropped from the file
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageBasis {
    /// `alignment / match_factor^0.25`.
    #[default]
    MatchFactor,
    /// `alignment / coverage_factor^0.25`.
    CoverageFactor,
    /// `alignment / counted_coverage^0.25`.
    CountedCoverage,
}

/// A single trained language's descriptor.
///
/// Strings are free-form UTF-8 in memory; the codec truncates/pads them to
/// fixed 64-byte NUL-padded fields on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageId {
    /// Index into the owning [`LanguageTable`]; equal to the `language_id`
    /// stored in frequency records that reference this language.
    pub id: u16,
    /// Language name, e.g. "English". May carry a friendly alias appended
    /// with `=`, e.g. "en=English" — see [`LanguageId::display_name`].
    pub name: String,
    pub region: String,
    pub encoding: String,
    pub source: String,
    pub script: String,
    /// Minimum start-offset modulus an n-gram of this language may match at:
    /// one of 1, 2, 4.
    pub alignment: u8,
    /// Coverage factor in (0, 1].
    pub coverage_factor: f64,
    /// Counted coverage in [0, 32].
    pub counted_coverage: f64,
    /// Frequency coverage in [0, 100].
    pub freq_coverage: f64,
    /// Match factor in [0, 16].
    pub match_factor: f64,
    /// Number of bytes of training corpus behind this language's model.
    pub training_bytes: u64,
}

impl LanguageId {
    /// The part of `name` before a `=`, or the whole name if there is none.
    pub fn language_code(&self) -> &str {
        self.name.split('=').next().unwrap_or(&self.name)
    }

    /// The friendly alias after `=`, if present, else falls back to
    /// `language_code`.
    pub fn display_name(&self) -> &str {
        match self.name.split_once('=') {
            Some((_, friendly)) if !friendly.is_empty() => friendly,
            _ => self.language_code(),
        }
    }

    /// `adjustments[id]`: `alignment / basis^0.25` when the chosen basis
    /// is > 0, else 1.0 (fallback for a degenerate language record).
    pub fn adjustment(&self, basis: CoverageBasis) -> f64 {
        let value = match basis {
            CoverageBasis::MatchFactor => self.match_factor,
            CoverageBasis::CoverageFactor => self.coverage_factor,
            CoverageBasis::CountedCoverage => self.counted_coverage,
        };
        if value > 0.0 {
            self.alignment as f64 / value.powf(0.25)
        } else {
            1.0
        }
    }
}

/// Ordered collection of [`LanguageId`] records, indexed by their `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageTable {
    languages: Vec<LanguageId>,
}

impl LanguageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut lang: LanguageId) -> u16 {
        let id = self.languages.len() as u16;
        lang.id = id;
        self.languages.push(lang);
        id
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn get(&self, id: u16) -> Option<&LanguageId> {
        if id == UNKNOWN_LANGUAGE {
            None
        } else {
            self.languages.get(id as usize)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageId> {
        self.languages.iter()
    }

    /// Find a language by its exact `language_code()`, or `UNKNOWN_LANGUAGE`
    /// if none matches.
    pub fn id_of(&self, code: &str) -> u16 {
        self.languages
            .iter()
            .find(|l| l.language_code() == code)
            .map(|l| l.id)
            .unwrap_or(UNKNOWN_LANGUAGE)
    }
}
