//! `langident`: a thin CLI driver over `langident-core`.
//!
//! Implements the external CLI surface (block-size selector, top-N, cutoff
//! ratio, separate-sources flag, friendly-name flag, script-annotation
//! flag, database path, and the `b<n>,s<n>` weight specifier) against the
//! library's public `Identifier` API. Everything this binary does
//! (argument parsing, chunking a buffer into blocks, transcoding the
//! result to UTF-8 for printing) lives outside `langident-core` itself; it
//! exists so the library is exercisable end to end.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use langident_core::{Identifier, LanguageTable, ScoreVector};
use log::debug;

/// Identify the language(s) of a file or of stdin.
#[derive(Parser, Debug)]
#[command(name = "langident", about = "Identify the natural language of a byte buffer")]
struct Args {
    /// Path to the language database. Falls back to `./languages.db`,
    /// `~/.langident/languages.db`, then `/usr/share/langident/languages.db`
    /// when the given path doesn't exist.
    #[arg(short = 'd', long = "database", default_value = "languages.db")]
    database: PathBuf,

    /// File to identify. Reads stdin when omitted.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Split the input into blocks of this many bytes and identify each
    /// block independently. `0` (default) identifies the whole input as one
    /// block.
    #[arg(short = 'b', long = "block-size", default_value_t = 0)]
    block_size: usize,

    /// Report at most this many languages per block. `0` means unlimited
    /// (subject only to `--cutoff`).
    #[arg(short = 'n', long = "top-n", default_value_t = 5)]
    top_n: usize,

    /// Drop candidates scoring below `cutoff * highest_score`.
    #[arg(short = 'c', long = "cutoff", default_value_t = 0.01)]
    cutoff_ratio: f64,

    /// Keep distinct (language, encoding, region) training sources as
    /// separate result rows instead of merging same-named languages and
    /// summing their scores.
    #[arg(short = 's', long = "separate-sources")]
    separate_sources: bool,

    /// Print each language's friendly display name instead of its code.
    #[arg(short = 'f', long = "friendly-names")]
    friendly_names: bool,

    /// Append the language's script to each result line.
    #[arg(short = 'x', long = "script")]
    script: bool,

    /// Override the bigram-length weight and/or the stop-gram penalty, e.g.
    /// `b0.2,s-6.0`. Either component may be omitted.
    #[arg(short = 'w', long = "weight")]
    weight: Option<String>,

    /// Disable stop-gram application (contributions from n-grams flagged as
    /// negative indicators are skipped instead of subtracted).
    #[arg(long = "no-stop-grams")]
    no_stop_grams: bool,

    /// Disable per-language alignment enforcement.
    #[arg(long = "no-alignment")]
    no_alignment: bool,

    /// Skip whitespace bytes during trie descent.
    #[arg(long = "ignore-whitespace")]
    ignore_whitespace: bool,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut identifier = match Identifier::load(&args.database, None, false, args.verbose) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("langident: cannot load database {}: {e}", args.database.display());
            return ExitCode::FAILURE;
        }
    };

    if let Some(spec) = &args.weight {
        if let Err(e) = apply_weight_spec(&mut identifier, spec) {
            eprintln!("langident: invalid --weight {spec:?}: {e}");
            return ExitCode::FAILURE;
        }
    }

    {
        let cfg = identifier.config_mut();
        cfg.apply_stop_grams = !args.no_stop_grams;
        cfg.enforce_alignment = !args.no_alignment;
        cfg.ignore_whitespace = args.ignore_whitespace;
    }

    let buf = match read_input(args.input.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("langident: failed to read input: {e}");
            return ExitCode::FAILURE;
        }
    };

    let blocks = chunk(&buf, args.block_size);
    for (i, block) in blocks.iter().enumerate() {
        if blocks.len() > 1 {
            println!("--- block {i} ({} bytes) ---", block.len());
        }
        let scores = identifier.identify_with_config(block);
        let mut finished = identifier.finish(scores, args.top_n, args.cutoff_ratio);
        if !args.separate_sources {
            finished.merge_duplicate_names_and_sort(identifier.language_table());
        }
        print_results(&finished, identifier.language_table(), &args);
    }

    ExitCode::SUCCESS
}

/// Split `b<n>,s<n>` into its bigram-weight and stop-gram-penalty
/// components and apply whichever are
/// present.
fn apply_weight_spec(identifier: &mut Identifier, spec: &str) -> Result<(), String> {
    for term in spec.split(',') {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let (tag, rest) = term.split_at(1);
        let value: f64 = rest
            .parse()
            .map_err(|_| format!("expected a number after '{tag}', got {rest:?}"))?;
        match tag {
            "b" | "B" => identifier.set_bigram_weight(value),
            "s" | "S" => identifier.set_stop_gram_penalty(value),
            other => return Err(format!("unknown weight component {other:?}")),
        }
    }
    Ok(())
}

fn read_input(path: Option<&std::path::Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(p) => std::fs::read(p),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Split `buf` into chunks of `block_size` bytes; `0` means "the whole
/// buffer as a single block".
fn chunk(buf: &[u8], block_size: usize) -> Vec<&[u8]> {
    if block_size == 0 || buf.is_empty() {
        return vec![buf];
    }
    buf.chunks(block_size).collect()
}

/// Render a finished score vector. A vector whose highest score is at or
/// below [`langident_core::LANGID_ZERO_SCORE`] counts as no match, not an
/// error, and renders as `??`.
fn print_results(scores: &ScoreVector, languages: &LanguageTable, args: &Args) {
    let highest = scores
        .entries()
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::MIN, f64::max);
    if scores.is_empty() || highest <= langident_core::LANGID_ZERO_SCORE {
        println!("??");
        return;
    }

    for &(lang_id, score) in scores.entries() {
        let Some(lang) = languages.get(lang_id) else {
            debug!("score vector referenced unknown language id {lang_id}");
            continue;
        };
        let name = if args.friendly_names {
            lang.display_name()
        } else {
            lang.language_code()
        };
        if args.script {
            println!("{name}\t{score:.6}\t{}", lang.script);
        } else {
            println!("{name}\t{score:.6}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_zero_block_size_yields_single_block() {
        let buf = b"hello world";
        let blocks = chunk(buf, 0);
        assert_eq!(blocks, vec![&buf[..]]);
    }

    #[test]
    fn chunk_splits_into_fixed_size_pieces() {
        let buf = b"abcdefghij";
        let blocks = chunk(buf, 4);
        assert_eq!(blocks, vec![&b"abcd"[..], &b"efgh"[..], &b"ij"[..]]);
    }

    #[test]
    fn weight_spec_sets_both_components() {
        let mut id = Identifier::empty();
        apply_weight_spec(&mut id, "b0.3,s-4.5").unwrap();
        assert_eq!(id.config().stop_gram_penalty(), -4.5);
    }

    #[test]
    fn weight_spec_rejects_unknown_tag() {
        let mut id = Identifier::empty();
        assert!(apply_weight_spec(&mut id, "q1.0").is_err());
    }
}
