//! 调用记录数据模型
//!
//! 每次 LLM 调用持久化为一个 JSON 文件，字段与磁盘格式一一对应。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 单次 LLM 调用记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// 记录 ID，同时也是文件名（不含扩展名）
    pub id: String,
    /// 创建时间（ISO-8601）
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    /// 会话 ID，未提供时为 "unknown"
    pub session_id: String,
    /// 耗时（秒，保留 3 位小数）
    pub duration: f64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub context: Map<String, Value>,
    pub request: RequestPayload,
    pub response: ResponsePayload,
}

impl CallRecord {
    /// 总 token 数
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// 一次已完成调用的元数据，由 provider 适配器在调用结束后填写
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCall {
    pub provider: String,
    pub model: String,
    /// 耗时（秒）
    pub duration: f64,
    pub session_id: Option<String>,
    pub context: Map<String, Value>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl LlmCall {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, duration: f64) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            duration,
            session_id: None,
            context: Map::new(),
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// 带类型名的内容，例如 `{"type": "HumanMessage", "content": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypedContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
}

impl TypedContent {
    pub fn new(kind: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }
}

/// (role, content) 二元组形式的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleContent {
    pub role: String,
    pub content: Value,
}

/// 列表请求中的单条消息
///
/// 反序列化按变体顺序尝试，原样透传的映射只有在不符合前两种形状时才落到 `Mapping`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageEntry {
    Typed(TypedContent),
    Role(RoleContent),
    Mapping(Map<String, Value>),
    Text(String),
}

/// 归一化后的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestPayload {
    String { content: String },
    List { messages: Vec<MessageEntry> },
    Unknown { content: String },
    Error { error: String },
}

impl RequestPayload {
    /// 磁盘上 `type` 字段的值
    pub fn kind(&self) -> &str {
        match self {
            RequestPayload::String { .. } => "string",
            RequestPayload::List { .. } => "list",
            RequestPayload::Unknown { .. } => "unknown",
            RequestPayload::Error { .. } => "error",
        }
    }
}

/// ChatResult 形式的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatResultPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub generations: Vec<TypedContent>,
}

/// 归一化失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: String,
}

/// 归一化后的响应
///
/// 响应的 `type` 可以是任意消息类型名（如 "AIMessage"），因此按字段形状区分而非按标签区分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    ChatResult(ChatResultPayload),
    Error(ErrorPayload),
    Message(TypedContent),
}

impl ResponsePayload {
    pub const CHAT_RESULT: &'static str = "ChatResult";

    pub fn chat_result(generations: Vec<TypedContent>) -> Self {
        ResponsePayload::ChatResult(ChatResultPayload {
            kind: Self::CHAT_RESULT.to_string(),
            generations,
        })
    }

    pub fn message(kind: impl Into<String>, content: impl Into<Value>) -> Self {
        ResponsePayload::Message(TypedContent::new(kind, content))
    }

    pub fn string(content: impl Into<String>) -> Self {
        Self::message("string", Value::String(content.into()))
    }

    pub fn unknown(content: impl Into<String>) -> Self {
        Self::message("unknown", Value::String(content.into()))
    }

    pub fn error(error: impl Into<String>) -> Self {
        ResponsePayload::Error(ErrorPayload {
            kind: "error".to_string(),
            error: error.into(),
        })
    }

    /// 磁盘上 `type` 字段的值
    pub fn kind(&self) -> &str {
        match self {
            ResponsePayload::ChatResult(p) => &p.kind,
            ResponsePayload::Error(p) => &p.kind,
            ResponsePayload::Message(p) => &p.kind,
        }
    }

    /// 响应中的文本内容（多个 generation 用换行拼接）
    pub fn text(&self) -> Option<String> {
        match self {
            ResponsePayload::ChatResult(p) => {
                let parts: Vec<&str> = p
                    .generations
                    .iter()
                    .filter_map(|g| g.content.as_str())
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            ResponsePayload::Message(p) => p.content.as_str().map(str::to_string),
            ResponsePayload::Error(_) => None,
        }
    }
}
