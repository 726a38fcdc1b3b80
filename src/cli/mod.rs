//! CLI 모듈
//!
//! pdf-chat CLI 명령어 정의 및 구현.
//! 대화형 REPL(`chat`)과 단발성 명령(`index`, `ask`, `collections`, `status`)을 제공합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::chat::{ChatSettings, Orchestrator, Role, SessionState, SessionStatus};
use crate::config::{get_data_dir, Config, VectorBackend, DEFAULT_COLLECTION};
use crate::embedding::GeminiEmbedding;
use crate::extractor::PdfLoader;
use crate::generation;
use crate::knowledge::{list_collections, open_store, SlidingWindowChunker, VectorIndex};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "pdf-chat")]
#[command(version, about = "PDF 문서 기반 RAG 채팅 도구", long_about = None)]
pub struct Cli {
    /// 벡터 저장소 백엔드 (qdrant, lance, memory)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 세션 설정 오버라이드
#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// 검색할 청크 수
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// 생성 temperature (0.0 ~ 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// 최대 출력 토큰
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF를 인덱싱하여 컬렉션 생성 (같은 이름이면 교체)
    Index {
        /// PDF 파일 경로
        pdf: PathBuf,

        /// 컬렉션 이름 (기본: pdf_docs_<파일명>)
        #[arg(short, long)]
        collection: Option<String>,
    },

    /// 대화형 채팅
    Chat {
        /// 시작 시 인덱싱할 PDF
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// 연결할 컬렉션 (기본: nodejs_docs)
        #[arg(short, long)]
        collection: Option<String>,

        #[command(flatten)]
        settings: ChatArgs,
    },

    /// 한 번 질문하고 종료
    Ask {
        /// 질문
        question: String,

        /// 컬렉션 이름
        #[arg(short, long, default_value = DEFAULT_COLLECTION)]
        collection: String,

        #[command(flatten)]
        settings: ChatArgs,
    },

    /// 컬렉션 목록
    Collections,

    /// 설정 및 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env().context("설정 로드 실패")?;
    if let Some(backend) = cli.backend.as_deref() {
        config.backend = backend.parse().context("--backend 값이 올바르지 않습니다")?;
        config.validate()?;
    }

    match cli.command {
        Commands::Index { pdf, collection } => cmd_index(&config, &pdf, collection.as_deref()).await,
        Commands::Chat {
            pdf,
            collection,
            settings,
        } => cmd_chat(&config, pdf, collection, &settings).await,
        Commands::Ask {
            question,
            collection,
            settings,
        } => cmd_ask(&config, &question, &collection, &settings).await,
        Commands::Collections => cmd_collections(&config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

/// 설정으로 오케스트레이터 구성
async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let store = open_store(config).await.context("벡터 저장소 연결 실패")?;
    let embedder = Arc::new(GeminiEmbedding::from_config(config).context("임베딩 초기화 실패")?);
    let chunker = Arc::new(SlidingWindowChunker::new(config.chunk.clone())?);
    let generator = generation::from_config(config).context("LLM 초기화 실패")?;

    Ok(Orchestrator::new(
        Arc::new(PdfLoader::new()),
        chunker,
        VectorIndex::new(store, embedder),
        generator,
        config.llm.model.clone(),
    ))
}

/// 설정 기본값에 CLI 오버라이드 적용
fn session_settings(config: &Config, args: &ChatArgs) -> Result<ChatSettings> {
    let settings = ChatSettings {
        top_k: args.k.unwrap_or(config.chat.top_k),
        temperature: args.temperature.unwrap_or(config.chat.temperature),
        max_tokens: args.max_tokens.unwrap_or(config.chat.max_tokens),
    };
    settings.validate()?;
    Ok(settings)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱싱 명령어 (index)
async fn cmd_index(config: &Config, pdf: &Path, collection: Option<&str>) -> Result<()> {
    if config.backend == VectorBackend::Memory {
        println!("[!] memory 백엔드는 프로세스 종료 시 사라집니다. 인덱싱 후 바로 채팅하려면 `chat --pdf`를 사용하세요.");
    }

    let orchestrator = build_orchestrator(config).await?;
    let mut state = SessionState::new(config.chat.clone())?;

    let size = std::fs::metadata(pdf).map(|m| m.len() as usize).unwrap_or(0);
    println!("[*] PDF 인덱싱 중: {} ({})", pdf.display(), format_bytes(size));

    let report = orchestrator
        .ingest(&mut state, pdf, collection)
        .await
        .context("인덱싱 실패")?;

    println!(
        "[OK] {} 페이지, {} 청크를 인덱싱했습니다",
        report.page_count, report.chunk_count
    );
    println!("     컬렉션: {}", report.collection.name);
    Ok(())
}

/// 단발 질문 명령어 (ask)
async fn cmd_ask(config: &Config, question: &str, collection: &str, args: &ChatArgs) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let mut state = SessionState::new(session_settings(config, args)?)?;

    orchestrator
        .load(&mut state, collection)
        .await
        .with_context(|| format!("컬렉션 '{}' 연결 실패", collection))?;

    let answer = orchestrator
        .ask(&mut state, question)
        .await
        .context("답변 생성 실패")?;

    println!("{}\n", answer.text);
    println!("--- Sources ---\n{}", answer.sources.trim_end());
    Ok(())
}

/// 컬렉션 목록 명령어 (collections)
async fn cmd_collections(config: &Config) -> Result<()> {
    let store = open_store(config).await.context("벡터 저장소 연결 실패")?;
    let collections = list_collections(store.as_ref())
        .await
        .context("컬렉션 목록 조회 실패")?;

    if collections.is_empty() {
        println!("[!] 컬렉션이 없습니다.");
        return Ok(());
    }

    println!("[OK] 컬렉션 ({} 개, {}):\n", collections.len(), store.backend());
    for collection in collections {
        println!("  {:<32} {} 청크", collection.name, collection.record_count);
    }
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("pdf-chat v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    match config.backend {
        VectorBackend::Qdrant => println!("[*] 벡터 저장소: qdrant ({})", config.qdrant.url),
        VectorBackend::Lance => {
            println!("[*] 벡터 저장소: lance ({})", config.lance_path.display())
        }
        VectorBackend::Memory => println!("[*] 벡터 저장소: memory"),
    }
    println!(
        "[*] 임베딩: {} ({}차원)",
        config.embedding.model, config.embedding.dimension
    );
    println!("[*] LLM: {:?} / {}", config.llm.provider, config.llm.model);
    println!(
        "[*] 청킹: {}자, 겹침 {}자 | 검색 k={} | temperature={} | max_tokens={}",
        config.chunk.max_chunk_length,
        config.chunk.overlap_length,
        config.chat.top_k,
        config.chat.temperature,
        config.chat.max_tokens
    );

    if config.embedding_api_key().is_ok() {
        println!("[OK] 임베딩 API 키: 설정됨");
    } else {
        println!("[!] 임베딩 API 키: 미설정 (export GEMINI_API_KEY=your-key)");
    }
    if config.llm_api_key().is_ok() {
        println!("[OK] LLM API 키: 설정됨");
    } else {
        println!("[!] LLM API 키: 미설정");
    }

    match open_store(config).await {
        Ok(store) => match list_collections(store.as_ref()).await {
            Ok(collections) => {
                let total: usize = collections.iter().map(|c| c.record_count).sum();
                println!("[OK] 컬렉션: {} 개 ({} 청크)", collections.len(), total)
            }
            Err(e) => println!("[!] 컬렉션 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 저장소 연결 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// REPL
// ============================================================================

/// REPL 입력 해석 결과
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Exit,
    Help,
    Clear,
    Load(String),
    Index(PathBuf),
    Sources,
    History,
    Status,
    SetK(usize),
    SetTemperature(f32),
    SetMaxTokens(u32),
    Ask(String),
    Empty,
    Invalid(String),
}

fn parse_repl_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
        return ReplCommand::Exit;
    }

    let Some(command) = line.strip_prefix(':') else {
        return ReplCommand::Ask(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match (name, arg) {
        ("help" | "h", _) => ReplCommand::Help,
        ("clear", _) => ReplCommand::Clear,
        ("sources", _) => ReplCommand::Sources,
        ("history", _) => ReplCommand::History,
        ("status", _) => ReplCommand::Status,
        ("load", "") | ("index", "") => ReplCommand::Invalid(format!(":{} 에 인자가 필요합니다", name)),
        ("load", name) => ReplCommand::Load(name.to_string()),
        ("index", path) => ReplCommand::Index(PathBuf::from(path)),
        ("k", v) => v
            .parse()
            .map(ReplCommand::SetK)
            .unwrap_or_else(|_| ReplCommand::Invalid(format!("잘못된 k 값: {}", v))),
        ("temp", v) => v
            .parse()
            .map(ReplCommand::SetTemperature)
            .unwrap_or_else(|_| ReplCommand::Invalid(format!("잘못된 temperature 값: {}", v))),
        ("max", v) => v
            .parse()
            .map(ReplCommand::SetMaxTokens)
            .unwrap_or_else(|_| ReplCommand::Invalid(format!("잘못된 max_tokens 값: {}", v))),
        _ => ReplCommand::Invalid(format!("알 수 없는 명령어: :{}", name)),
    }
}

const REPL_HELP: &str = "\
명령어:
  exit | quit | q     종료
  :clear              대화 기록 초기화
  :load <name>        컬렉션 연결
  :index <pdf>        PDF 인덱싱 후 연결
  :sources            마지막 답변의 출처
  :history            대화 기록
  :status             세션 상태
  :k <n>              검색 청크 수
  :temp <x>           temperature (0.0 ~ 1.0)
  :max <n>            최대 출력 토큰";

/// 대화형 채팅 명령어 (chat)
async fn cmd_chat(
    config: &Config,
    pdf: Option<PathBuf>,
    collection: Option<String>,
    args: &ChatArgs,
) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let mut state = SessionState::new(session_settings(config, args)?)?;

    if let Some(pdf) = pdf {
        println!("[*] PDF 인덱싱 중: {}", pdf.display());
        let report = orchestrator
            .ingest(&mut state, &pdf, collection.as_deref())
            .await
            .context("인덱싱 실패")?;
        println!(
            "[OK] {} 청크 인덱싱 완료 (컬렉션: {})",
            report.chunk_count, report.collection.name
        );
    } else {
        let name = collection.as_deref().unwrap_or(DEFAULT_COLLECTION);
        match orchestrator.load(&mut state, name).await {
            Ok(c) => println!("[OK] 컬렉션 연결: {} ({} 청크)", c.name, c.record_count),
            Err(e) => println!("[!] {}\n    :index <pdf> 또는 :load <name> 으로 시작하세요", e),
        }
    }

    println!("\n질문을 입력하세요 (:help 도움말, exit 종료)\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_repl_line(&line) {
            ReplCommand::Exit => break,
            ReplCommand::Empty => continue,
            ReplCommand::Help => println!("{}", REPL_HELP),
            ReplCommand::Invalid(msg) => println!("[!] {}", msg),
            ReplCommand::Clear => {
                orchestrator.reset(&mut state);
                println!("[OK] 대화 기록을 지웠습니다");
            }
            ReplCommand::Load(name) => match orchestrator.load(&mut state, &name).await {
                Ok(c) => println!("[OK] 컬렉션 연결: {} ({} 청크)", c.name, c.record_count),
                Err(e) => println!("[!] {}", e),
            },
            ReplCommand::Index(path) => {
                println!("[*] PDF 인덱싱 중: {}", path.display());
                match orchestrator.ingest(&mut state, &path, None).await {
                    Ok(report) => println!(
                        "[OK] {} 청크 인덱싱 완료 (컬렉션: {})",
                        report.chunk_count, report.collection.name
                    ),
                    Err(e) => println!("[!] {}", e),
                }
            }
            ReplCommand::Sources => match state.last_sources() {
                Some(sources) => println!("{}", sources.trim_end()),
                None => println!("[!] 아직 답변이 없습니다"),
            },
            ReplCommand::History => print_history(&state),
            ReplCommand::Status => print_session_status(&state),
            ReplCommand::SetK(k) => update_setting(&mut state, |s| s.top_k = k),
            ReplCommand::SetTemperature(t) => update_setting(&mut state, |s| s.temperature = t),
            ReplCommand::SetMaxTokens(m) => update_setting(&mut state, |s| s.max_tokens = m),
            ReplCommand::Ask(query) => match orchestrator.ask(&mut state, &query).await {
                Ok(answer) => println!("\nAssistant: {}\n", answer.text),
                Err(e) => println!("[!] {}", e),
            },
        }
    }

    println!("Bye!");
    Ok(())
}

fn update_setting(state: &mut SessionState, change: impl FnOnce(&mut ChatSettings)) {
    let mut settings = state.settings().clone();
    change(&mut settings);
    match state.update_settings(settings) {
        Ok(()) => print_settings(state.settings()),
        Err(e) => println!("[!] {}", e),
    }
}

fn print_settings(settings: &ChatSettings) {
    println!(
        "[OK] k={} | temperature={} | max_tokens={}",
        settings.top_k, settings.temperature, settings.max_tokens
    );
}

fn print_history(state: &SessionState) {
    if state.messages().is_empty() {
        println!("[!] 대화 기록이 없습니다");
        return;
    }

    for msg in state.messages() {
        let who = match msg.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!(
            "[{}] {}: {}",
            msg.created_at.format("%H:%M:%S"),
            who,
            truncate_text(&msg.content, 120)
        );
    }
}

fn print_session_status(state: &SessionState) {
    match (state.status(), state.collection()) {
        (SessionStatus::Ready, Some(c)) => {
            println!("[OK] Ready | 컬렉션: {} ({} 청크)", c.name, c.record_count)
        }
        _ => println!("[!] PDF를 인덱싱하거나 컬렉션을 연결하세요"),
    }
    println!("     메시지: {}", state.messages().len());
    print_settings(state.settings());
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전, 한 줄로)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit_keywords() {
        for word in ["exit", "quit", "q", "  QUIT  "] {
            assert_eq!(parse_repl_line(word), ReplCommand::Exit);
        }
    }

    #[test]
    fn test_parse_questions_and_commands() {
        assert_eq!(
            parse_repl_line("What is a stream?"),
            ReplCommand::Ask("What is a stream?".to_string())
        );
        assert_eq!(parse_repl_line("   "), ReplCommand::Empty);
        assert_eq!(parse_repl_line(":clear"), ReplCommand::Clear);
        assert_eq!(
            parse_repl_line(":load nodejs_docs"),
            ReplCommand::Load("nodejs_docs".to_string())
        );
        assert_eq!(
            parse_repl_line(":index ./docs/my file.pdf"),
            ReplCommand::Index(PathBuf::from("./docs/my file.pdf"))
        );
        assert_eq!(parse_repl_line(":k 5"), ReplCommand::SetK(5));
        assert_eq!(parse_repl_line(":temp 0.2"), ReplCommand::SetTemperature(0.2));
        assert_eq!(parse_repl_line(":max 500"), ReplCommand::SetMaxTokens(500));
    }

    #[test]
    fn test_parse_invalid_commands() {
        assert!(matches!(parse_repl_line(":load"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_repl_line(":k many"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_repl_line(":unknown"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn test_update_setting_rejects_invalid() {
        let mut state = SessionState::default();
        update_setting(&mut state, |s| s.temperature = 2.0);
        assert_eq!(state.settings().temperature, 0.7);

        update_setting(&mut state, |s| s.top_k = 5);
        assert_eq!(state.settings().top_k, 5);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["pdf-chat", "ask", "hello", "-k", "2"]).unwrap();
        match cli.command {
            Commands::Ask {
                question,
                collection,
                settings,
            } => {
                assert_eq!(question, "hello");
                assert_eq!(collection, DEFAULT_COLLECTION);
                assert_eq!(settings.k, Some(2));
            }
            _ => panic!("expected ask"),
        }

        let cli = Cli::try_parse_from(["pdf-chat", "--backend", "lance", "index", "a.pdf"]).unwrap();
        assert_eq!(cli.backend.as_deref(), Some("lance"));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
        assert_eq!(truncate_text("안녕하세요 세계", 5), "안녕하세요...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
