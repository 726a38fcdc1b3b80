//! Chat 모듈 - 컨텍스트 구성과 세션 오케스트레이션

mod context;
mod session;

pub use context::{assemble_context, format_sources, truncate_chars, SOURCE_PREVIEW_CHARS};
pub use session::{
    Answer, ChatMessage, ChatSettings, IngestReport, Orchestrator, Role, SessionState,
    SessionStatus,
};
