//! langident-core
//!
//! A multi-language n-gram scoring engine built around a shared packed
//! trie: every trained language's n-grams live in one trie, each leaf
//! carrying a list of per-language scaled scores. Identifying a buffer
//! slides a trie walker across every byte offset, accumulating
//! contributions into a per-language [`ScoreVector`], then post-processes
//! (coverage adjustment, sort, cutoff, dedupe).
//!
//! Start at [`Identifier`]: load a model with [`Identifier::load`], score
//! a buffer with [`Identifier::identify`], and finish with
//! [`Identifier::finish`].

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod freq;
pub mod identifier;
pub mod langid;
pub mod scorevec;
pub mod scoring;
pub mod similarity;
pub mod trie;

pub use builder::TrieBuilder;
pub use config::EngineConfig;
pub use error::{LangIdentError, Result};
pub use freq::{FrequencyPool, FrequencyRecord, ScoreTable};
pub use identifier::Identifier;
pub use langid::{CoverageBasis, LanguageId, LanguageTable, UNKNOWN_LANGUAGE};
pub use scorevec::{ScoreVector, LANGID_ZERO_SCORE};
pub use scoring::ScoringOptions;
pub use trie::{NodeIndex, PackedTrie};
