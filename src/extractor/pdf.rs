//! PDF 텍스트 추출
//!
//! pdf-extract 크레이트의 페이지 단위 추출을 사용합니다.

use std::path::Path;

use crate::error::{RagError, Result};

/// PDF 헤더 탐색 범위 (일부 PDF는 앞에 쓰레기 바이트가 있음)
const HEADER_SEARCH_BYTES: usize = 1024;

/// PDF에서 페이지별 텍스트 추출
///
/// 반환 벡터의 순서가 곧 페이지 순서입니다. 텍스트가 없는 페이지도
/// 번호를 유지하기 위해 빈 문자열로 남깁니다.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|e| RagError::load(path, e))?;
    extract_pages_from_mem(path, &bytes)
}

fn extract_pages_from_mem(path: &Path, bytes: &[u8]) -> Result<Vec<String>> {
    if !has_pdf_header(bytes) {
        return Err(RagError::load(path, "not a PDF file (missing %PDF- header)"));
    }

    let pages: Vec<String> = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::load(path, e))?
        .into_iter()
        .map(|page| page.trim().to_string())
        .collect();

    if pages.iter().all(|p| p.is_empty()) {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
    }

    if pages.is_empty() {
        return Ok(vec![String::new()]);
    }

    Ok(pages)
}

/// 파일 앞부분에 `%PDF-` 시그니처가 있는지 확인
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SEARCH_BYTES)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// 페이지마다 한 줄씩 Helvetica 텍스트를 가진 최소 PDF 생성
#[cfg(test)]
pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let font_id = 3 + page_count * 2;

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + i * 2)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_count
        ),
    ];

    for (i, text) in pages.iter().enumerate() {
        let content_id = 4 + i * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            font_id, content_id
        ));
        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.into_bytes()
}

// ============================================================================
// Tests
// ============================================================================
