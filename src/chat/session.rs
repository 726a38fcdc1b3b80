//! Session Orchestrator - 인덱싱/연결 후 질의응답 루프
//!
//! 상태는 `SessionState` 값으로 명시적으로 전달되며, 외부 서비스는
//! `Orchestrator` 생성 시 주입됩니다. 세션마다 자기 `SessionState`를 소유합니다.
//!
//! 상태 전이:
//! - EMPTY/READY --ingest/load 성공--> READY (실패 시 상태 유지)
//! - READY --ask--> READY
//! - reset: 대화 기록만 비움 (컬렉션 연결 유지)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::context::{assemble_context, format_sources};
use crate::error::{RagError, Result};
use crate::extractor::DocumentLoader;
use crate::generation::{AnswerGenerator, GenerationParams, Prompt};
use crate::knowledge::{collection_name_for, Chunker, Collection, RetrievedChunk, VectorIndex};

// ============================================================================
// Chat Types
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 대화 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// 답변의 출처 목록 (assistant만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: Some(sources.into()),
            created_at: Utc::now(),
        }
    }
}

/// 세션별 검색/생성 설정
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    /// 검색할 청크 수
    pub top_k: usize,
    /// 0.0 ~ 1.0
    pub temperature: f32,
    /// 최대 출력 토큰
    pub max_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl ChatSettings {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// 연결된 컬렉션 없음
    Empty,
    /// 질문 가능
    Ready,
}

/// 한 대화 세션의 상태
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    collection: Option<Collection>,
    messages: Vec<ChatMessage>,
    settings: ChatSettings,
    last_sources: Option<String>,
}

impl SessionState {
    pub fn new(settings: ChatSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..Default::default()
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self.collection {
            Some(_) => SessionStatus::Ready,
            None => SessionStatus::Empty,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == SessionStatus::Ready
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// 마지막 답변의 출처 목록
    pub fn last_sources(&self) -> Option<&str> {
        self.last_sources.as_deref()
    }

    /// 설정 교체 (검증 실패 시 기존 설정 유지)
    pub fn update_settings(&mut self, settings: ChatSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// 인덱싱 결과
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub collection: Collection,
    pub source: PathBuf,
    pub page_count: usize,
    pub chunk_count: usize,
}

/// 질의 결과
#[derive(Debug, Clone)]
pub struct Answer {
    /// 생성된 답변
    pub text: String,
    /// 사용자 표시용 출처 목록
    pub sources: String,
    /// LLM에 보낸 컨텍스트
    pub context: String,
    /// 검색 결과 (유사도 내림차순)
    pub results: Vec<RetrievedChunk>,
}

/// 세션 오케스트레이터
///
/// 모든 협력 객체는 생성자로 주입합니다. 여러 세션이 하나의 오케스트레이터를
/// 공유할 수 있으며, 인덱싱(컬렉션 교체)은 오케스트레이터 단위로 직렬화됩니다.
pub struct Orchestrator {
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    index: VectorIndex,
    generator: Arc<dyn AnswerGenerator>,
    model: String,
    ingest_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        chunker: Arc<dyn Chunker>,
        index: VectorIndex,
        generator: Arc<dyn AnswerGenerator>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            chunker,
            index,
            generator,
            model: model.into(),
            ingest_lock: Mutex::new(()),
        }
    }

    /// PDF 인덱싱 후 세션에 연결
    ///
    /// `collection_name`이 없으면 `pdf_docs_<파일명>`을 사용합니다.
    /// 같은 이름의 컬렉션은 교체됩니다. 실패하면 세션 상태는 바뀌지 않습니다.
    pub async fn ingest(
        &self,
        state: &mut SessionState,
        path: &Path,
        collection_name: Option<&str>,
    ) -> Result<IngestReport> {
        let name = collection_name
            .map(str::to_string)
            .unwrap_or_else(|| collection_name_for(path));

        tracing::info!(path = %path.display(), collection = %name, "Ingesting document");

        // 1. 로드
        let document = self.loader.load(path).await?;
        if document.is_blank() {
            return Err(RagError::load(
                path,
                "No extractable text (scanned or image-only PDF?)",
            ));
        }

        // 2. 청킹
        let chunks = self.chunker.chunk(&document.pages);
        tracing::debug!(
            chunker = self.chunker.name(),
            pages = document.page_count(),
            chunks = chunks.len(),
            "Document chunked"
        );

        // 3. 임베딩 + 저장
        let source = path.display().to_string();
        let collection = {
            let _guard = self.ingest_lock.lock().await;
            self.index
                .create_from_chunks(&name, &chunks, Some(&source))
                .await?
        };

        state.collection = Some(collection.clone());
        state.last_sources = None;

        Ok(IngestReport {
            collection,
            source: path.to_path_buf(),
            page_count: document.page_count(),
            chunk_count: chunks.len(),
        })
    }

    /// 기존 컬렉션 연결 (실패 시 상태 유지)
    pub async fn load(&self, state: &mut SessionState, collection_name: &str) -> Result<Collection> {
        let collection = self.index.load_existing(collection_name).await?;
        state.collection = Some(collection.clone());
        state.last_sources = None;
        Ok(collection)
    }

    /// 질문 → 검색 → 컨텍스트 구성 → 답변 생성
    ///
    /// READY가 아니면 외부 호출 없이 `NotIndexed`.
    /// 사용자 메시지는 질문을 받는 즉시 기록하고, 답변은 성공했을 때만 기록합니다.
    pub async fn ask(&self, state: &mut SessionState, query: &str) -> Result<Answer> {
        let collection = state.collection.clone().ok_or(RagError::NotIndexed)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::Config("Question must not be empty".to_string()));
        }

        let params = GenerationParams {
            model: self.model.clone(),
            temperature: state.settings.temperature,
            max_tokens: state.settings.max_tokens,
        };
        params.validate()?;
        let k = state.settings.top_k;

        state.messages.push(ChatMessage::user(query));

        let results = self.index.similarity_search(&collection, query, k).await?;
        if results.is_empty() {
            tracing::warn!(collection = %collection.name, "No chunks retrieved for query");
        }

        let context = assemble_context(&results);
        let sources = format_sources(&results);
        let prompt = Prompt::new(&context, query);

        let text = self.generator.generate(&prompt, &params).await?;

        state
            .messages
            .push(ChatMessage::assistant(text.clone(), sources.clone()));
        state.last_sources = Some(sources.clone());

        tracing::info!(
            collection = %collection.name,
            retrieved = results.len(),
            generator = self.generator.name(),
            "Answer generated"
        );

        Ok(Answer {
            text,
            sources,
            context,
            results,
        })
    }

    /// 대화 기록 초기화 (컬렉션 연결은 유지)
    pub fn reset(&self, state: &mut SessionState) {
        state.messages.clear();
        state.last_sources = None;
        tracing::debug!("Chat history cleared");
    }
}
