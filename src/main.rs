use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use llm_recorder::common::preview;
use llm_recorder::{CallRecord, CallRecorder, RecorderConfig};

/// 查看 LLM 调用记录
#[derive(Debug, Parser)]
#[command(name = "llm-recorder", version, about)]
struct Cli {
    /// 记录目录（默认读取 LLM_RECORD_DIR，未设置时为 data/llm_records）
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 列出最近的记录
    Recent {
        /// 返回的记录条数
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// 按 ID 输出完整记录
    Show { id: String },
    /// 记录目录统计
    Stats,
}

fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RecorderConfig::from_env();
    if let Some(dir) = cli.dir {
        config = config.with_record_dir(dir);
    }
    let recorder = CallRecorder::new(config);

    match cli.command {
        Command::Recent { limit } => {
            let records = recorder.get_recent_records(limit);
            if records.is_empty() {
                println!("未找到调用记录");
                return Ok(());
            }
            println!("找到 {} 条最新记录:", records.len());
            for (i, record) in records.iter().enumerate() {
                print_summary(i + 1, record, &recorder);
            }
        }
        Command::Show { id } => match recorder.get_record(&id) {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("记录不存在: {}", id),
        },
        Command::Stats => {
            let stats = recorder.stats();
            println!("记录目录: {}", stats.record_dir.display());
            println!("记录启用: {}", stats.enabled);
            println!("文件数量: {}", stats.file_count);
            println!("总大小: {} 字节", stats.total_size_bytes);
        }
    }

    Ok(())
}

fn print_summary(index: usize, record: &CallRecord, recorder: &CallRecorder) {
    println!();
    println!("记录 {}:", index);
    println!("  记录ID: {}", record.id);
    println!("  提供商: {}", record.provider);
    println!("  模型: {}", record.model);
    println!("  会话ID: {}", record.session_id);
    println!("  执行时间: {:.2}秒", record.duration);
    println!("  输入tokens: {}", record.input_tokens);
    println!("  输出tokens: {}", record.output_tokens);
    println!("  成本: ¥{:.6}", record.cost);
    if let Some(text) = record.response.text() {
        println!("  响应预览: {}", preview(&text, 100));
    }
    println!(
        "  文件: {}",
        recorder.record_dir().join(format!("{}.json", record.id)).display()
    );
}
