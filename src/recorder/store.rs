//! 调用记录的文件存储
//!
//! 每次调用写入记录目录下的一个 `<id>.json` 文件：
//! - 写入失败只记录日志，不影响调用方
//! - 按文件修改时间读取最近的记录
//! - 损坏的文件跳过并告警

use std::cmp::Reverse;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Local, SecondsFormat};

use super::config::RecorderConfig;
use super::model::{CallRecord, LlmCall};
use super::normalize::{CallInput, CallOutput, normalize_request, normalize_response};

/// 记录文件扩展名
const RECORD_EXTENSION: &str = "json";

/// ID 冲突时追加序号的最大尝试次数
const MAX_ID_ATTEMPTS: u32 = 1000;

/// LLM 调用记录器
#[derive(Debug, Clone)]
pub struct CallRecorder {
    config: RecorderConfig,
}

impl CallRecorder {
    /// 创建记录器，并确保记录目录存在
    pub fn new(config: RecorderConfig) -> Self {
        if let Err(e) = std::fs::create_dir_all(&config.record_dir) {
            tracing::warn!(
                path = %config.record_dir.display(),
                "创建记录目录失败: {}",
                e
            );
        }

        if config.enabled {
            tracing::info!(path = %config.record_dir.display(), "LLM 调用记录器已启用");
        } else {
            tracing::debug!("LLM 调用记录器未启用");
        }

        Self { config }
    }

    /// 使用环境变量配置创建
    pub fn from_env() -> Self {
        Self::new(RecorderConfig::from_env())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn record_dir(&self) -> &Path {
        &self.config.record_dir
    }

    /// 记录一次调用
    ///
    /// 未启用时直接返回。任何失败都只写 error 日志，不会传递给调用方。
    pub fn record_call(&self, call: &LlmCall, messages: &CallInput<'_>, response: &CallOutput<'_>) {
        if !self.config.enabled {
            return;
        }

        match self.try_record_call(call, messages, response) {
            Ok(path) => {
                tracing::debug!(
                    provider = %call.provider,
                    model = %call.model,
                    path = %path.display(),
                    "LLM 调用记录已保存"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %call.provider,
                    model = %call.model,
                    "保存 LLM 调用记录失败: {:#}",
                    e
                );
            }
        }
    }

    fn try_record_call(
        &self,
        call: &LlmCall,
        messages: &CallInput<'_>,
        response: &CallOutput<'_>,
    ) -> anyhow::Result<PathBuf> {
        let now = Local::now();

        let mut record = CallRecord {
            id: record_id(&call.provider, &call.model, &now),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            provider: call.provider.clone(),
            model: call.model.clone(),
            session_id: call
                .session_id
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            duration: round_duration(call.duration),
            input_tokens: call.input_tokens,
            output_tokens: call.output_tokens,
            cost: if call.cost.is_finite() { call.cost } else { 0.0 },
            context: call.context.clone(),
            request: normalize_request(messages),
            response: normalize_response(response),
        };

        self.write_record(&mut record)
    }

    /// 将记录写入 `<id>.json`
    ///
    /// 文件已存在时在 ID 后追加 `_1`、`_2` 等序号，写入成功后 `record.id` 为最终 ID。
    fn write_record(&self, record: &mut CallRecord) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.config.record_dir).with_context(|| {
            format!("创建记录目录失败: {}", self.config.record_dir.display())
        })?;

        let base_id = record.id.clone();
        for attempt in 0..MAX_ID_ATTEMPTS {
            if attempt > 0 {
                record.id = format!("{}_{}", base_id, attempt);
            }
            let path = self.record_path(&record.id);
            let json = serde_json::to_vec_pretty(&record).context("序列化调用记录失败")?;

            // create_new 保证不会覆盖已存在的记录
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&json)
                        .with_context(|| format!("写入记录文件失败: {}", path.display()))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("创建记录文件失败: {}", path.display()));
                }
            }
        }

        anyhow::bail!("记录 ID 冲突次数过多: {}", base_id)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.config
            .record_dir
            .join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// 获取最近的记录（按文件修改时间倒序）
    ///
    /// 无法读取目录时返回空列表；单个文件解析失败时跳过。
    pub fn get_recent_records(&self, limit: usize) -> Vec<CallRecord> {
        if limit == 0 {
            return Vec::new();
        }

        let files = match self.list_record_files() {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("获取记录失败: {:#}", e);
                return Vec::new();
            }
        };

        files
            .into_iter()
            .take(limit)
            .filter_map(|file| read_record(&file.path))
            .collect()
    }

    /// 按 ID 读取单条记录
    pub fn get_record(&self, id: &str) -> Option<CallRecord> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            tracing::warn!(record_id = %id, "非法的记录 ID");
            return None;
        }

        let path = self.record_path(id);
        if !path.is_file() {
            tracing::debug!(record_id = %id, "记录不存在");
            return None;
        }

        read_record(&path)
    }

    /// 列出记录文件，最新的在前
    fn list_record_files(&self) -> anyhow::Result<Vec<RecordFile>> {
        let entries = std::fs::read_dir(&self.config.record_dir).with_context(|| {
            format!("读取记录目录失败: {}", self.config.record_dir.display())
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("读取目录项失败: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "读取文件元数据失败: {}", e);
                    continue;
                }
            };

            files.push(RecordFile {
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
                path,
            });
        }

        // 修改时间相同时按文件名倒序，文件名中含时间戳
        files.sort_by_key(|f| Reverse((f.modified, f.path.file_name().map(|n| n.to_os_string()))));
        Ok(files)
    }

    /// 获取存储统计
    pub fn stats(&self) -> RecorderStats {
        let (file_count, total_size_bytes) = self
            .list_record_files()
            .map(|files| (files.len(), files.iter().map(|f| f.size).sum()))
            .unwrap_or((0, 0));

        RecorderStats {
            file_count,
            total_size_bytes,
            record_dir: self.config.record_dir.clone(),
            enabled: self.config.enabled,
        }
    }
}

/// 目录中的一个记录文件
struct RecordFile {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

/// 存储统计信息
#[derive(Debug, Clone)]
pub struct RecorderStats {
    /// 记录文件数量
    pub file_count: usize,
    /// 总文件大小（字节）
    pub total_size_bytes: u64,
    /// 记录目录
    pub record_dir: PathBuf,
    /// 是否启用
    pub enabled: bool,
}

fn is_record_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == RECORD_EXTENSION)
        .unwrap_or(false)
}

fn read_record(path: &Path) -> Option<CallRecord> {
    let result = std::fs::read_to_string(path)
        .context("读取文件失败")
        .and_then(|content| serde_json::from_str::<CallRecord>(&content).context("解析 JSON 失败"));

    match result {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %path.display(), "读取记录文件失败: {:#}", e);
            None
        }
    }
}

/// 生成记录 ID：`{provider}_{model}_{YYYYmmdd_HHMMSS_微秒}`
fn record_id(provider: &str, model: &str, now: &DateTime<Local>) -> String {
    format!(
        "{}_{}_{}",
        sanitize_id_part(provider),
        sanitize_id_part(model),
        now.format("%Y%m%d_%H%M%S_%6f")
    )
}

/// 清理 ID 中不能出现在文件名里的字符
fn sanitize_id_part(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// 耗时保留 3 位小数，负数和非有限值记为 0
fn round_duration(duration: f64) -> f64 {
    if !duration.is_finite() || duration < 0.0 {
        return 0.0;
    }
    let rounded = (duration * 1000.0).round() / 1000.0;
    // 极大值乘 1000 会溢出为 inf
    if rounded.is_finite() { rounded } else { duration }
}

/// 全局调用记录器实例
static CALL_RECORDER: OnceLock<CallRecorder> = OnceLock::new();

/// 初始化全局调用记录器
///
/// 只有第一次调用生效，返回是否由本次调用完成初始化。
pub fn init_global_recorder(config: RecorderConfig) -> bool {
    let installed = CALL_RECORDER.set(CallRecorder::new(config)).is_ok();
    if !installed {
        tracing::warn!("全局调用记录器已初始化，忽略新的配置");
    }
    installed
}

/// 获取全局调用记录器，未初始化时从环境变量创建
pub fn global_recorder() -> &'static CallRecorder {
    CALL_RECORDER.get_or_init(CallRecorder::from_env)
}
