use std::sync::OnceLock;

use text_splitter::{ChunkCapacity, ChunkConfig, ChunkSizer, TextSplitter};
use tiktoken_rs::CoreBPE;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChunk {
    pub chunk_index: usize,
    pub text: String,
    pub token_count: usize,
}

/// Token-aware recursive split (§4.B): descends paragraph -> line -> sentence -> space -> empty
/// boundaries, re-prepending `chunk_overlap_tokens` between chunks, via `text-splitter`. The sizer
/// is `cl100k_base`, the spec's fixed reference encoding, so chunk counts are reproducible
/// independent of the generation model in play.
pub fn chunk_text(
    text: &str,
    chunk_size_tokens: usize,
    chunk_overlap_tokens: usize,
) -> Result<Vec<PreparedChunk>, AppError> {
    if chunk_size_tokens == 0 {
        return Err(AppError::InputInvalid("chunk_size_tokens must be greater than 0".into()));
    }
    if chunk_overlap_tokens >= chunk_size_tokens {
        return Err(AppError::InputInvalid(format!(
            "chunk_overlap_tokens ({chunk_overlap_tokens}) must be less than chunk_size_tokens ({chunk_size_tokens})"
        )));
    }

    let sizer = Cl100kSizer::get()?;

    let capacity = ChunkCapacity::new(chunk_size_tokens);
    let config = ChunkConfig::new(capacity)
        .with_overlap(chunk_overlap_tokens)
        .map_err(|err| AppError::InputInvalid(format!("invalid chunk overlap: {err}")))?
        .with_sizer(sizer);
    let splitter = TextSplitter::new(config);

    let chunks: Vec<PreparedChunk> = splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(chunk_index, chunk)| PreparedChunk {
            chunk_index,
            text: chunk.to_string(),
            token_count: sizer.size(chunk),
        })
        .collect();

    Ok(chunks)
}

struct Cl100kSizer {
    bpe: &'static CoreBPE,
}

impl Cl100kSizer {
    fn get() -> Result<Self, AppError> {
        static BPE: OnceLock<Result<CoreBPE, String>> = OnceLock::new();

        match BPE.get_or_init(|| tiktoken_rs::cl100k_base().map_err(|err| err.to_string())) {
            Ok(bpe) => Ok(Self { bpe }),
            Err(err) => Err(AppError::InternalError(format!(
                "failed to initialize cl100k_base tokenizer: {err}"
            ))),
        }
    }
}

impl ChunkSizer for Cl100kSizer {
    fn size(&self, chunk: &str) -> usize {
        self.bpe.encode_ordinary(chunk).len()
    }
}
