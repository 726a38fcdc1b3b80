//! Text Chunking Module
//!
//! 페이지 텍스트를 고정 길이 윈도우로 분할합니다.
//! 윈도우는 `max_chunk_length - overlap_length` 문자씩 전진하며,
//! 인접 청크는 정확히 `overlap_length` 문자를 공유합니다.
//! 길이 단위는 바이트가 아닌 문자(char)입니다.

use std::str::FromStr;

use crate::error::{RagError, Result};
use crate::extractor::PageUnit;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 페이지 경계 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageBoundary {
    /// 페이지마다 독립적으로 분할 (청크가 두 페이지에 걸치지 않음)
    #[default]
    PerPage,
    /// 모든 페이지를 줄바꿈으로 이어 붙인 뒤 분할 (청크 시작 위치의 페이지 번호 사용)
    Continuous,
}

impl FromStr for PageBoundary {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "per_page" | "per-page" | "page" => Ok(Self::PerPage),
            "continuous" => Ok(Self::Continuous),
            other => Err(RagError::Config(format!(
                "Unknown page boundary '{}'. Use per_page or continuous",
                other
            ))),
        }
    }
}

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 길이 (문자 수)
    pub max_chunk_length: usize,
    /// 인접 청크 간 중첩 길이 (문자 수)
    pub overlap_length: usize,
    /// 페이지 경계 처리 방식
    pub page_boundary: PageBoundary,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: 1000,
            overlap_length: 400,
            page_boundary: PageBoundary::PerPage,
        }
    }
}

impl ChunkConfig {
    /// 설정 검증
    ///
    /// overlap이 청크 길이 이상이면 윈도우가 전진하지 못하므로 거부합니다.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_length == 0 {
            return Err(RagError::Config(
                "max_chunk_length must be greater than zero".to_string(),
            ));
        }
        if self.overlap_length >= self.max_chunk_length {
            return Err(RagError::Config(format!(
                "overlap_length ({}) must be less than max_chunk_length ({})",
                self.overlap_length, self.max_chunk_length
            )));
        }
        Ok(())
    }

    /// 윈도우 전진 폭
    pub fn step(&self) -> usize {
        self.max_chunk_length - self.overlap_length
    }

    /// 길이 `total_length` 텍스트에서 생성될 청크 수
    pub fn expected_chunks(&self, total_length: usize) -> usize {
        if total_length == 0 {
            0
        } else if total_length <= self.max_chunk_length {
            1
        } else {
            1 + (total_length - self.max_chunk_length).div_ceil(self.step())
        }
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 분할된 텍스트 조각
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 청크 텍스트
    pub text: String,
    /// 원본 페이지 번호
    pub page_number: usize,
    /// 문서 내 순번 (0-based)
    pub chunk_index: usize,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 페이지 목록을 청크로 분할
    fn chunk(&self, pages: &[PageUnit]) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 고정 길이 슬라이딩 윈도우 청커
///
/// 마지막 윈도우는 `max_chunk_length`보다 짧아도 유지합니다.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    /// 설정으로 생성 (검증 실패 시 에러)
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정(1000/400)으로 생성
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 문자 길이 `len`에 대한 (시작, 끝) 윈도우 목록
    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        let mut spans = Vec::with_capacity(self.config.expected_chunks(len));
        if len == 0 {
            return spans;
        }

        let step = self.config.step();
        let mut start = 0;
        loop {
            let end = (start + self.config.max_chunk_length).min(len);
            spans.push((start, end));
            if end >= len {
                break;
            }
            start += step;
        }
        spans
    }

    fn chunk_per_page(&self, pages: &[PageUnit]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages.iter().filter(|p| !p.text.trim().is_empty()) {
            let offsets = char_offsets(&page.text);
            for (start, end) in self.windows(offsets.len() - 1) {
                chunks.push(Chunk {
                    text: page.text[offsets[start]..offsets[end]].to_string(),
                    page_number: page.page_number,
                    chunk_index: chunks.len(),
                });
            }
        }

        chunks
    }

    fn chunk_continuous(&self, pages: &[PageUnit]) -> Vec<Chunk> {
        let mut text = String::new();
        // (시작 문자 위치, 페이지 번호)
        let mut page_starts: Vec<(usize, usize)> = Vec::new();
        let mut char_len = 0;

        for page in pages.iter().filter(|p| !p.text.trim().is_empty()) {
            if !text.is_empty() {
                text.push('\n');
                char_len += 1;
            }
            page_starts.push((char_len, page.page_number));
            text.push_str(&page.text);
            char_len += page.text.chars().count();
        }

        let offsets = char_offsets(&text);
        self.windows(char_len)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                text: text[offsets[start]..offsets[end]].to_string(),
                page_number: page_at(&page_starts, start),
                chunk_index: i,
            })
            .collect()
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, pages: &[PageUnit]) -> Vec<Chunk> {
        match self.config.page_boundary {
            PageBoundary::PerPage => self.chunk_per_page(pages),
            PageBoundary::Continuous => self.chunk_continuous(pages),
        }
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 인덱스 -> 바이트 오프셋 (마지막 원소는 text.len())
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// 문자 위치가 속한 페이지 번호
fn page_at(page_starts: &[(usize, usize)], position: usize) -> usize {
    page_starts
        .iter()
        .take_while(|(start, _)| *start <= position)
        .last()
        .map(|(_, page)| *page)
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================
