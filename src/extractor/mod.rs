//! 문서 로더 모듈
//!
//! PDF 파일에서 페이지 단위 텍스트를 추출합니다.
//! - PdfLoader: pdf-extract로 페이지별 텍스트 추출
//! - DocumentLoader 트레이트: 세션에 주입되는 로더 인터페이스

pub mod pdf;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// 첫 페이지 번호
///
/// 기존 인덱싱 도구(PyPDF 계열 로더)와 payload 호환을 위해 0부터 시작합니다.
pub const PAGE_BASE: usize = 0;

// ============================================================================
// Types
// ============================================================================

/// 한 페이지의 추출 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUnit {
    /// 페이지 번호 (PAGE_BASE부터 시작)
    pub page_number: usize,
    /// 페이지 텍스트
    pub text: String,
}

/// 로드된 문서
#[derive(Debug, Clone)]
pub struct Document {
    /// 원본 파일 경로
    pub path: PathBuf,
    /// 페이지 목록 (페이지 번호 오름차순)
    pub pages: Vec<PageUnit>,
}

impl Document {
    /// 페이지 수
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 추출된 텍스트가 전혀 없는지 여부 (스캔 문서 등)
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

// ============================================================================
// DocumentLoader Trait
// ============================================================================

/// 문서 로더 트레이트
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// 파일을 읽어 페이지 단위 문서로 변환
    async fn load(&self, path: &Path) -> Result<Document>;
}

// ============================================================================
// PdfLoader
// ============================================================================

/// PDF 로더
#[derive(Debug, Default, Clone)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        if !path.is_file() {
            return Err(RagError::load(path, "file does not exist"));
        }

        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        // 손상된 PDF에서 추출기가 panic해도 JoinError로 받아 LoadError로 변환
        let owned = path.to_path_buf();
        let texts = tokio::task::spawn_blocking(move || pdf::extract_pages(&owned))
            .await
            .map_err(|e| RagError::load(path, format!("PDF extraction task failed: {}", e)))??;

        let pages: Vec<PageUnit> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageUnit {
                page_number: PAGE_BASE + i,
                text,
            })
            .collect();

        tracing::info!("Loaded PDF {:?} ({} pages)", path, pages.len());

        Ok(Document {
            path: path.to_path_buf(),
            pages,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let result = PdfLoader::new().load(&dir.path().join("nope.pdf")).await;
        assert!(matches!(result, Err(RagError::Load { .. })));
    }

    #[tokio::test]
    async fn test_non_pdf_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "just some plain text, not a PDF").unwrap();

        let result = PdfLoader::new().load(&path).await;
        assert!(matches!(result, Err(RagError::Load { .. })));
    }

    #[tokio::test]
    async fn test_directory_is_load_error() {
        let dir = TempDir::new().unwrap();
        let result = PdfLoader::new().load(dir.path()).await;
        assert!(matches!(result, Err(RagError::Load { .. })));
    }

    #[tokio::test]
    async fn test_load_numbers_pages_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guide.pdf");
        std::fs::write(
            &path,
            pdf::sample_pdf(&["First page alpha", "Second page beta", "Third page gamma"]),
        )
        .unwrap();

        let doc = PdfLoader::new().load(&path).await.unwrap();
        assert_eq!(doc.page_count(), 3);

        let numbers: Vec<usize> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![PAGE_BASE, PAGE_BASE + 1, PAGE_BASE + 2]);
        assert!(doc.pages[1].text.contains("beta"));
        assert!(!doc.pages[1].text.contains("alpha"));
        assert!(!doc.is_blank());
    }

    #[test]
    fn test_document_helpers() {
        let doc = Document {
            path: PathBuf::from("/tmp/guide.pdf"),
            pages: vec![
                PageUnit { page_number: 0, text: "  ".to_string() },
                PageUnit { page_number: 1, text: String::new() },
            ],
        };
        assert_eq!(doc.page_count(), 2);
        assert!(doc.is_blank());
    }
}
