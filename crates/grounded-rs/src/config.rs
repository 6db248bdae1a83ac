//! Summarizer configuration.
//!
//! [`SummarizerConfig`] carries the generation knobs shared by every request;
//! optional stages are wrapped in [`Toggle`] so they can be switched off
//! without losing their settings.

/// An optional stage: on/off plus its settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Toggle<T: Default> {
    pub enabled: bool,
    pub config: T,
}

impl<T: Default> Toggle<T> {
    /// A disabled stage with default settings.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            config: T::default(),
        }
    }

    /// An enabled stage with the given settings.
    pub fn enabled(config: T) -> Self {
        Self {
            enabled: true,
            config,
        }
    }

    /// The settings when the stage is on.
    pub fn active(&self) -> Option<&T> {
        self.enabled.then_some(&self.config)
    }
}

impl<T: Default> Default for Toggle<T> {
    fn default() -> Self {
        Self::enabled(T::default())
    }
}

/// Chunked map-reduce settings for oversized digests.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    /// Digests at least this long (chars) are condensed first. Default: 3200.
    pub trigger_chars: usize,
    /// Upper size of one chunk (chars). Default: 2200.
    pub chunk_chars: usize,
    /// Chunks beyond this count are not summarized. Default: 4.
    pub max_chunks: usize,
    /// Token cap for one chunk summary. Default: 220.
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Chunk summaries shorter than this (chars) are discarded. Default: 60.
    pub min_summary_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            trigger_chars: 3200,
            chunk_chars: 2200,
            max_chunks: 4,
            max_tokens: 220,
            temperature: 0.35,
            top_p: 0.75,
            min_summary_chars: 60,
        }
    }
}

/// Settings for a [`GroundedSummarizer`](crate::pipeline::GroundedSummarizer).
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizerConfig {
    /// Overrides the per-kind token budget (still clamped to 160..=2000).
    pub max_tokens: Option<u32>,
    /// Default: `Some(1.1)`.
    pub repetition_penalty: Option<f32>,
    /// Default: 20.
    pub repetition_context_size: u32,
    /// Let the model emit reasoning before answering. Default: off.
    pub enable_thinking: bool,
    pub chunking: Toggle<ChunkConfig>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            repetition_penalty: Some(1.1),
            repetition_context_size: 20,
            enable_thinking: false,
            chunking: Toggle::default(),
        }
    }
}

impl SummarizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_repetition_penalty(mut self, penalty: Option<f32>) -> Self {
        self.repetition_penalty = penalty;
        self
    }

    pub fn with_repetition_context_size(mut self, size: u32) -> Self {
        self.repetition_context_size = size;
        self
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.enable_thinking = enabled;
        self
    }

    pub fn with_chunking(mut self, chunking: Toggle<ChunkConfig>) -> Self {
        self.chunking = chunking;
        self
    }
}
