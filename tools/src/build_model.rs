//! `build-model`: assemble a `langident` `.db` file from plain-text
//! per-language n-gram counts.
//!
//! Deliberately the smallest real form a model builder can take: no corpus
//! tokenisation, counting, or pruning happens here, only packing
//! already-counted n-grams into the on-disk format via
//! [`langident_core::TrieBuilder`]. It exists so the codec and scoring
//! engine have something real to round-trip.
//!
//! # Input layout
//!
//! A directory containing:
//! - `languagelist`: one line per language, tab-separated:
//!   `code  friendly_name  region  encoding  source  script  alignment
//!    coverage_factor  counted_coverage  freq_coverage  match_factor  ngram_file`
//!   `ngram_file` is a path relative to the languagelist's own directory.
//! - One n-gram file per language, each line tab-separated:
//!   `hex_ngram  count  [stop]`
//!   `hex_ngram` is the n-gram's raw bytes, hex-encoded (so n-grams may
//!   contain arbitrary bytes, including tabs and newlines); `count` is a
//!   non-negative integer; a third column of exactly `stop` flags the
//!   n-gram as a stop-gram for that language.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use langident_core::{FrequencyPool, LanguageId, LanguageTable, PackedTrie, ScoreTable, TrieBuilder};
use log::info;

/// Build a langident .db model file from plain-text per-language n-gram counts.
#[derive(Parser, Debug)]
#[command(name = "build-model")]
struct Args {
    /// Directory containing `languagelist` and the per-language n-gram files
    /// it references.
    #[arg(short = 'i', long = "input")]
    input_dir: PathBuf,

    /// Output `.db` path.
    #[arg(short = 'o', long = "output", default_value = "languages.db")]
    output: PathBuf,

    /// Packed trie child-slot width: 2, 3, or 4.
    #[arg(long = "bits", default_value_t = 4)]
    bits: u8,
}

/// One `languagelist` row before its n-gram file has been read.
struct LanguageSpec {
    lang: LanguageId,
    ngram_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !(2..=4).contains(&args.bits) {
        bail!("--bits must be 2, 3, or 4, got {}", args.bits);
    }

    let specs = read_language_list(&args.input_dir)?;
    info!("read {} language(s) from languagelist", specs.len());

    let mut languages = LanguageTable::new();
    let mut builder = TrieBuilder::new(args.bits);
    let mut max_raw_score: u32 = 0;
    let mut have_bigrams = false;

    for spec in specs {
        let id = languages.push(spec.lang);
        let entries = read_ngram_file(&spec.ngram_file)
            .with_context(|| format!("reading n-gram file {}", spec.ngram_file.display()))?;
        for (ngram, count, stop) in entries {
            if ngram.len() == 2 {
                have_bigrams = true;
            }
            max_raw_score = max_raw_score.max(count);
            builder.insert(&ngram, id, count, stop);
        }
    }

    let (trie, pool): (PackedTrie, FrequencyPool) = builder.compact();
    let score_table = ScoreTable::default_generator(max_raw_score);

    let bytes = langident_core::codec::write_model(&languages, &trie, &pool, &score_table, have_bigrams);
    fs::write(&args.output, &bytes)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        "wrote {} ({} languages, {} trie nodes, {} frequency records) to {}",
        args.output.display(),
        languages.len(),
        trie.node_count(),
        pool.len(),
        args.output.display(),
    );
    Ok(())
}

fn read_language_list(dir: &Path) -> Result<Vec<LanguageSpec>> {
    let list_path = dir.join("languagelist");
    let content = fs::read_to_string(&list_path)
        .with_context(|| format!("reading {}", list_path.display()))?;

    let mut specs = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 12 {
            bail!(
                "{}:{}: expected 12 tab-separated fields, got {}",
                list_path.display(),
                lineno + 1,
                fields.len()
            );
        }
        let lang = LanguageId {
            id: 0,
            name: fields[0].to_string(),
            region: fields[2].to_string(),
            encoding: fields[3].to_string(),
            source: fields[4].to_string(),
            script: fields[5].to_string(),
            alignment: fields[6]
                .parse()
                .with_context(|| format!("{}:{}: alignment", list_path.display(), lineno + 1))?,
            coverage_factor: fields[7].parse().unwrap_or(1.0),
            counted_coverage: fields[8].parse().unwrap_or(0.0),
            freq_coverage: fields[9].parse().unwrap_or(0.0),
            match_factor: fields[10].parse().unwrap_or(0.0),
            training_bytes: 0,
        };
        // field[1] (friendly_name) folds into `name` as "code=friendly", the
        // convention LanguageId::display_name already understands.
        let name = if fields[1].is_empty() || fields[1] == fields[0] {
            fields[0].to_string()
        } else {
            format!("{}={}", fields[0], fields[1])
        };
        let ngram_file = dir.join(fields[11]);
        specs.push(LanguageSpec {
            lang: LanguageId { name, ..lang },
            ngram_file,
        });
    }
    Ok(specs)
}

/// Parse one n-gram file into `(ngram_bytes, raw_score, stop)` triples.
/// `count` is clamped to the range the on-disk frequency word can carry:
/// bit 0 is the stop flag, bit 31 the list terminator, so 30 bits are
/// available for the score itself.
fn read_ngram_file(path: &Path) -> Result<Vec<(Vec<u8>, u32, bool)>> {
    const MAX_RAW_SCORE: u32 = (1 << 30) - 1;
    let content = fs::read_to_string(path)?;
    let mut out = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            bail!("{}:{}: expected at least hex_ngram<TAB>count", path.display(), lineno + 1);
        }
        let ngram = decode_hex(fields[0])
            .with_context(|| format!("{}:{}: invalid hex n-gram", path.display(), lineno + 1))?;
        let count: u64 = fields[1]
            .parse()
            .with_context(|| format!("{}:{}: invalid count", path.display(), lineno + 1))?;
        let stop = fields.get(2).map(|s| *s == "stop").unwrap_or(false);
        out.push((ngram, count.min(MAX_RAW_SCORE as u64) as u32, stop));
    }
    Ok(out)
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("hex string has odd length");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).context("invalid hex digit"))
        .collect()
}
