//! **corpusprint** - Batch fingerprinting and actor correlation for harvested web text
//!
//! Groups crawled records by a canonical SHA-256 of their text, classifies each
//! group by topic (zero-shot model with keyword fallback), maps shared PGP keys,
//! wallets and emails back to the URLs that mention them, and clusters titles
//! served from several URLs.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core processing pipeline
pub mod core {
    /// Collector record model and payload parsing
    pub mod record;
    pub use record::{ExtractedArtifacts, Payload, SourceRecord, parse_payload};

    /// Whitespace/case-insensitive SHA-256 fingerprints
    pub mod hasher;
    pub use hasher::{Fingerprint, fingerprint, normalize};

    /// Artifact, onion link and social handle extraction from HTML
    pub mod extract;
    pub use extract::{ArtifactExtractor, run as extract_run};

    /// Fingerprint buckets and enriched entries
    pub mod index;
    pub use index::{EnrichedIndex, FingerprintEntry, FingerprintIndex, IndexOptions};

    /// Topic classification (model first, keyword lexicon fallback)
    pub mod classify;
    pub use classify::{Classification, TopicClassifier, TopicStrategy, run as classify_run};

    /// Artifact → URL maps per artifact kind
    pub mod actors;
    pub use actors::{ActorMaps, ArtifactKind};

    /// Exact-title mirror clusters
    pub mod clusters;
    pub use clusters::{TitleClusters, run as clusters_run};

    /// Run orchestration on a bounded worker pool
    pub mod pipeline;
    pub use pipeline::{CancelFlag, Pipeline, PipelineError, PipelineOptions, run as pipeline_run};
}

/// Infrastructure - Configuration, I/O and output layout
pub mod infra {
    /// Layered configuration (file + CORPUSPRINT__ env)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Memory-mapped reads for large payloads, JSON writes
    pub mod io;
    pub use io::{FileContent, load_payload, read_file_smart, write_json};

    /// Date-stamped output paths
    pub mod output;
    pub use output::{OutputLayout, write_outputs};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{classify_run, clusters_run, extract_run, pipeline_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    ActorMaps, ArtifactKind, CancelFlag, Classification, EnrichedIndex, FingerprintEntry,
    FingerprintIndex, Pipeline, PipelineError, PipelineOptions, SourceRecord, TopicClassifier,
};
