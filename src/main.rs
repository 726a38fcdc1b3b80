//! pdf-chat CLI 진입점

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // .env 로드 (없으면 무시)
    dotenvy::dotenv().ok();

    // 로깅 초기화 (stdout은 REPL 출력용)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // CLI 실행
    let cli = pdf_chat::cli::Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(pdf_chat::cli::run(cli))
}
