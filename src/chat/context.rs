//! Context Assembler - 검색 결과를 프롬프트 컨텍스트와 출처 목록으로 변환
//!
//! 순수 포맷팅 함수만 있습니다. 같은 순서의 입력이면 항상 같은 결과를 냅니다.

use crate::knowledge::RetrievedChunk;

/// 출처 미리보기 길이 (문자 수)
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// 페이지 번호가 없을 때 표시
const NO_PAGE: &str = "N/A";

fn page_label(page: Option<usize>) -> String {
    page.map(|p| p.to_string()).unwrap_or_else(|| NO_PAGE.to_string())
}

/// 프롬프트용 컨텍스트 문자열
///
/// 검색 순서대로 `Page Content: <text>\nPage Number: <page>` 블록을 빈 줄로 연결합니다.
pub fn assemble_context(results: &[RetrievedChunk]) -> String {
    results
        .iter()
        .map(|r| format!("Page Content: {}\nPage Number: {}", r.text, page_label(r.page_number)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 사용자 표시용 출처 목록 (1부터 번호)
pub fn format_sources(results: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "**Source {}** (Page {}):\n{}...\n\n",
            i + 1,
            page_label(r.page_number),
            truncate_chars(&r.text, SOURCE_PREVIEW_CHARS)
        ));
    }
    out
}

/// 앞에서부터 최대 `max_chars` 문자 (UTF-8 경계 안전)
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
