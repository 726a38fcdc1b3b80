//! 세션 오케스트레이터 통합 테스트
//!
//! 외부 서비스 대신 호출 횟수를 세는 테스트 더블을 주입합니다.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pdf_chat::knowledge::{ScoredRecord, VectorRecord};
use pdf_chat::{
    AnswerGenerator, ChatSettings, ChunkConfig, Chunker, Document, DocumentLoader, EmbeddingProvider,
    GenerationParams, InMemoryVectorStore, Orchestrator, PageUnit, Prompt, RagError, Result,
    Role, SessionState, SessionStatus, SlidingWindowChunker, VectorIndex, VectorStore,
};

// ============================================================================
// Test Doubles
// ============================================================================

/// 고정 페이지를 돌려주는 로더
struct FixedPageLoader {
    pages: Vec<String>,
    calls: AtomicUsize,
}

impl FixedPageLoader {
    fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentLoader for FixedPageLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if path.to_string_lossy().contains("missing") {
            return Err(RagError::Load {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }
        Ok(Document {
            path: path.to_path_buf(),
            pages: self
                .pages
                .iter()
                .enumerate()
                .map(|(i, text)| PageUnit {
                    page_number: i,
                    text: text.clone(),
                })
                .collect(),
        })
    }
}

/// 바이트 값으로 만드는 결정적 임베더
#[derive(Default)]
struct DeterministicEmbedder {
    document_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl DeterministicEmbedder {
    const DIM: usize = 8;

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; Self::DIM];
        for (i, b) in text.bytes().enumerate() {
            v[i % Self::DIM] += b as f32 / 255.0;
        }
        v
    }

    fn total_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst) + self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimension(&self) -> usize {
        Self::DIM
    }

    fn name(&self) -> &str {
        "deterministic"
    }
}

/// 검색 호출을 세는 저장소 래퍼 (쓰기/검색 실패 주입 가능)
#[derive(Default)]
struct CountingStore {
    inner: InMemoryVectorStore,
    searches: AtomicUsize,
    fail_upsert: AtomicBool,
    fail_search: AtomicBool,
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        self.inner.create_collection(name, dimension).await
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(RagError::VectorIndexWrite {
                collection: name.to_string(),
                message: "disk full".to_string(),
            });
        }
        self.inner.upsert(name, records).await
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(RagError::VectorIndexRead {
                collection: name.to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.inner.search(name, query, limit).await
    }

    async fn count(&self, name: &str) -> Result<usize> {
        self.inner.count(name).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.inner.list_collections().await
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// 호출 횟수와 마지막 프롬프트를 기록하는 생성기
#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
    fail: AtomicBool,
    last_prompt: Mutex<Option<Prompt>>,
    last_params: Mutex<Option<GenerationParams>>,
}

#[async_trait]
impl AnswerGenerator for CountingGenerator {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        *self.last_params.lock().unwrap() = Some(params.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Generation("service unavailable".to_string()));
        }
        Ok(format!("answer #{}", n))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct Harness {
    orchestrator: Orchestrator,
    loader: Arc<FixedPageLoader>,
    embedder: Arc<DeterministicEmbedder>,
    store: Arc<CountingStore>,
    generator: Arc<CountingGenerator>,
}

impl Harness {
    /// 1000/1600/1500자 페이지 (1000/400 설정에서 1 + 2 + 2 = 5 청크)
    fn three_pages() -> Self {
        Self::with_pages(vec!["a".repeat(1000), "b".repeat(1600), "c".repeat(1500)])
    }

    fn with_pages(pages: Vec<String>) -> Self {
        let loader = Arc::new(FixedPageLoader::new(pages));
        let embedder = Arc::new(DeterministicEmbedder::default());
        let store = Arc::new(CountingStore::default());
        let generator = Arc::new(CountingGenerator::default());
        let chunker = Arc::new(SlidingWindowChunker::new(ChunkConfig::default()).unwrap());

        let orchestrator = Orchestrator::new(
            loader.clone(),
            chunker,
            VectorIndex::new(store.clone(), embedder.clone()),
            generator.clone(),
            "test-model",
        );

        Self {
            orchestrator,
            loader,
            embedder,
            store,
            generator,
        }
    }

    fn state(top_k: usize) -> SessionState {
        SessionState::new(ChatSettings {
            top_k,
            ..Default::default()
        })
        .unwrap()
    }
}

fn pdf() -> PathBuf {
    PathBuf::from("/docs/manual.pdf")
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn ask_before_ready_makes_no_calls() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);

    let result = h.orchestrator.ask(&mut state, "summarize").await;

    assert!(matches!(result, Err(RagError::NotIndexed)));
    assert_eq!(h.embedder.total_calls(), 0);
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert!(state.messages().is_empty());
    assert_eq!(state.status(), SessionStatus::Empty);
}

#[tokio::test]
async fn three_page_pdf_yields_five_chunks_and_three_context_blocks() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);

    let report = h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    assert_eq!(report.page_count, 3);
    assert_eq!(report.chunk_count, 5);
    assert_eq!(report.collection.name, "pdf_docs_manual");
    assert_eq!(report.collection.record_count, 5);
    assert_eq!(state.status(), SessionStatus::Ready);

    let answer = h.orchestrator.ask(&mut state, "summarize").await.unwrap();
    assert_eq!(answer.context.matches("Page Content:").count(), 3);
    assert_eq!(answer.results.len(), 3);
    assert!(answer
        .results
        .windows(2)
        .all(|w| w[0].score >= w[1].score));

    let prompt = h.generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.user.starts_with("Context:\nPage Content:"));
    assert!(prompt.user.ends_with("\n\nQuestion: summarize"));

    let params = h.generator.last_params.lock().unwrap().clone().unwrap();
    assert_eq!(params.model, "test-model");
    assert_eq!(params.max_tokens, 2000);
}

#[tokio::test]
async fn fewer_records_than_k_returns_all() {
    let h = Harness::with_pages(vec!["short page".to_string()]);
    let mut state = Harness::state(5);

    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    let answer = h.orchestrator.ask(&mut state, "anything").await.unwrap();

    assert_eq!(answer.results.len(), 1);
    assert_eq!(answer.results[0].page_number, Some(0));
}

#[tokio::test]
async fn loading_missing_collection_keeps_state_empty() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);

    let result = h.orchestrator.load(&mut state, "nonexistent_collection").await;

    assert!(matches!(result, Err(RagError::CollectionNotFound(name)) if name == "nonexistent_collection"));
    assert_eq!(state.status(), SessionStatus::Empty);
    assert!(state.collection().is_none());
}

#[tokio::test]
async fn failed_ingest_keeps_previous_collection() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);

    h.orchestrator
        .ingest(&mut state, &pdf(), Some("docs"))
        .await
        .unwrap();

    let result = h
        .orchestrator
        .ingest(&mut state, Path::new("/docs/missing.pdf"), None)
        .await;

    assert!(matches!(result, Err(RagError::Load { .. })));
    assert_eq!(state.collection().unwrap().name, "docs");
    assert_eq!(h.loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blank_document_is_rejected() {
    let h = Harness::with_pages(vec!["   ".to_string(), String::new()]);
    let mut state = Harness::state(3);

    let result = h.orchestrator.ingest(&mut state, &pdf(), None).await;

    assert!(matches!(result, Err(RagError::Load { .. })));
    assert_eq!(state.status(), SessionStatus::Empty);
    assert_eq!(h.embedder.total_calls(), 0);
}

#[tokio::test]
async fn two_questions_make_four_messages() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();

    h.orchestrator.ask(&mut state, "first?").await.unwrap();
    h.orchestrator.ask(&mut state, "second?").await.unwrap();

    let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(state.messages()[2].content, "second?");
    assert_eq!(state.messages()[3].content, "answer #2");
    assert!(state.messages()[3].sources.as_deref().unwrap().starts_with("**Source 1**"));
    assert!(state.messages()[0].sources.is_none());
}

#[tokio::test]
async fn reset_clears_history_but_stays_ready() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    h.orchestrator.ask(&mut state, "first?").await.unwrap();

    h.orchestrator.reset(&mut state);

    assert!(state.messages().is_empty());
    assert!(state.last_sources().is_none());
    assert_eq!(state.status(), SessionStatus::Ready);

    h.orchestrator.ask(&mut state, "again?").await.unwrap();
    assert_eq!(state.messages().len(), 2);
    // 재인덱싱 없이 질문 가능
    assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generation_failure_keeps_user_turn_only() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    h.generator.fail.store(true, Ordering::SeqCst);

    let result = h.orchestrator.ask(&mut state, "will this fail?").await;

    assert!(matches!(result, Err(RagError::Generation(_))));
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].role, Role::User);
    assert!(state.last_sources().is_none());
    assert_eq!(state.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn load_existing_matches_fresh_collection() {
    let h = Harness::three_pages();
    let mut fresh = Harness::state(3);
    h.orchestrator
        .ingest(&mut fresh, &pdf(), Some("round_trip"))
        .await
        .unwrap();
    let direct = h.orchestrator.ask(&mut fresh, "bbb").await.unwrap();

    let mut loaded = Harness::state(3);
    let collection = h.orchestrator.load(&mut loaded, "round_trip").await.unwrap();
    assert_eq!(collection.record_count, 5);
    let reloaded = h.orchestrator.ask(&mut loaded, "bbb").await.unwrap();

    assert_eq!(direct.results, reloaded.results);
    assert_eq!(direct.context, reloaded.context);
}

#[tokio::test]
async fn reingest_replaces_collection() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);

    h.orchestrator.ingest(&mut state, &pdf(), Some("docs")).await.unwrap();
    let report = h.orchestrator.ingest(&mut state, &pdf(), Some("docs")).await.unwrap();

    assert_eq!(report.collection.record_count, 5);
    assert_eq!(h.store.count("docs").await.unwrap(), 5);
}

#[tokio::test]
async fn invalid_settings_are_rejected_before_any_call() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    let queries_before = h.embedder.query_calls.load(Ordering::SeqCst);

    let result = state.update_settings(ChatSettings {
        temperature: 1.5,
        ..Default::default()
    });
    assert!(matches!(result, Err(RagError::Config(_))));

    let result = h.orchestrator.ask(&mut state, "   ").await;
    assert!(matches!(result, Err(RagError::Config(_))));
    assert_eq!(h.embedder.query_calls.load(Ordering::SeqCst), queries_before);
    assert!(state.messages().is_empty());
}

#[tokio::test]
async fn failed_write_drops_partial_collection() {
    let h = Harness::three_pages();
    h.store.fail_upsert.store(true, Ordering::SeqCst);

    let index = VectorIndex::new(h.store.clone(), h.embedder.clone());
    let chunks = SlidingWindowChunker::new(ChunkConfig::default())
        .unwrap()
        .chunk(&[PageUnit {
            page_number: 0,
            text: "x".repeat(1200),
        }]);

    let result = index.create_from_chunks("docs", &chunks, None).await;

    assert!(matches!(result, Err(RagError::VectorIndexWrite { .. })));
    assert!(!h.store.collection_exists("docs").await.unwrap());
}

#[tokio::test]
async fn failed_write_leaves_session_empty() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.store.fail_upsert.store(true, Ordering::SeqCst);

    let result = h.orchestrator.ingest(&mut state, &pdf(), None).await;

    assert!(matches!(result, Err(RagError::VectorIndexWrite { .. })));
    assert_eq!(state.status(), SessionStatus::Empty);
    assert!(state.collection().is_none());
    assert!(!h.store.collection_exists("pdf_docs_manual").await.unwrap());
}

#[tokio::test]
async fn retrieval_failure_keeps_user_turn_only() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    h.store.fail_search.store(true, Ordering::SeqCst);

    let result = h.orchestrator.ask(&mut state, "where is it?").await;

    assert!(matches!(result, Err(RagError::VectorIndexRead { .. })));
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].role, Role::User);
    assert!(state.last_sources().is_none());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn retrieval_failure_keeps_previous_sources() {
    let h = Harness::three_pages();
    let mut state = Harness::state(3);
    h.orchestrator.ingest(&mut state, &pdf(), None).await.unwrap();
    h.orchestrator.ask(&mut state, "first?").await.unwrap();
    let sources = state.last_sources().map(str::to_string);

    h.store.fail_search.store(true, Ordering::SeqCst);
    let result = h.orchestrator.ask(&mut state, "second?").await;

    assert!(result.is_err());
    assert_eq!(state.last_sources().map(str::to_string), sources);
    let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
}
