//! 请求/响应归一化
//!
//! 调用方通过 [`CallInput`] / [`CallOutput`] 显式描述输入输出的形状，
//! 各 provider 的原生消息类型通过实现 [`HasTextContent`] / [`HasGenerations`] 接入。
//! 归一化永远产出一个可序列化的结果：无法处理的内容退化为字符串，
//! 适配器报错时退化为 `{"type": "error"}`。

use std::borrow::Cow;
use std::fmt::Debug;

use serde_json::{Map, Value};

use super::model::{MessageEntry, RequestPayload, ResponsePayload, RoleContent, TypedContent};

/// 带类型名和文本内容的消息（如 HumanMessage / AIMessage）
pub trait HasTextContent {
    /// 消息类型名，写入记录的 `type` 字段
    fn type_name(&self) -> Cow<'_, str>;

    /// 消息内容，通常是字符串，多模态消息可以是数组
    fn content(&self) -> anyhow::Result<Value>;
}

/// 包含多个 generation 的响应（如 ChatResult）
pub trait HasGenerations {
    /// 每个 generation 中的消息
    fn generations(&self) -> anyhow::Result<Vec<&dyn HasTextContent>>;

    /// 没有 generation 时记录的字符串形式
    fn repr(&self) -> String {
        "ChatResult(generations=[])".to_string()
    }
}

/// 通用消息适配器
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub kind: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn new(kind: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<Value>) -> Self {
        Self::new("HumanMessage", content)
    }

    pub fn system(content: impl Into<Value>) -> Self {
        Self::new("SystemMessage", content)
    }

    pub fn ai(content: impl Into<Value>) -> Self {
        Self::new("AIMessage", content)
    }
}

impl HasTextContent for ChatMessage {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.kind)
    }

    fn content(&self) -> anyhow::Result<Value> {
        Ok(self.content.clone())
    }
}

/// 通用 ChatResult 适配器
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResult {
    pub generations: Vec<ChatMessage>,
}

impl ChatResult {
    pub fn new(generations: Vec<ChatMessage>) -> Self {
        Self { generations }
    }
}

impl HasGenerations for ChatResult {
    fn generations(&self) -> anyhow::Result<Vec<&dyn HasTextContent>> {
        Ok(self
            .generations
            .iter()
            .map(|m| m as &dyn HasTextContent)
            .collect())
    }

    fn repr(&self) -> String {
        format!("{:?}", self)
    }
}

/// 消息列表中的单条输入
pub enum InputMessage<'a> {
    /// 带类型名的消息对象
    Rich(&'a dyn HasTextContent),
    /// (role, content) 二元组
    Pair(Cow<'a, str>, Value),
    /// 已经是 role/content 形式的映射，原样保存
    Mapping(Map<String, Value>),
    /// 其他内容，保存其字符串形式
    Other(String),
}

impl<'a> InputMessage<'a> {
    pub fn pair(role: impl Into<Cow<'a, str>>, content: impl Into<Value>) -> Self {
        InputMessage::Pair(role.into(), content.into())
    }

    pub fn other(value: &impl Debug) -> Self {
        InputMessage::Other(format!("{:?}", value))
    }
}

/// 调用输入
pub enum CallInput<'a> {
    Text(Cow<'a, str>),
    Messages(Vec<InputMessage<'a>>),
    /// 无法识别的输入，保存其字符串形式
    Unknown(String),
}

impl<'a> CallInput<'a> {
    pub fn text(text: impl Into<Cow<'a, str>>) -> Self {
        CallInput::Text(text.into())
    }

    /// 由 (role, content) 列表构造
    pub fn pairs<R, C, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<Cow<'a, str>>,
        C: Into<Value>,
    {
        CallInput::Messages(
            pairs
                .into_iter()
                .map(|(role, content)| InputMessage::pair(role, content))
                .collect(),
        )
    }

    /// 由消息对象列表构造
    pub fn rich<M: HasTextContent>(messages: &'a [M]) -> Self {
        CallInput::Messages(
            messages
                .iter()
                .map(|m| InputMessage::Rich(m as &dyn HasTextContent))
                .collect(),
        )
    }

    pub fn unknown(value: &impl Debug) -> Self {
        CallInput::Unknown(format!("{:?}", value))
    }

    /// 由原始 JSON 载荷构造
    ///
    /// 字符串视为文本；数组中的对象原样保存，`[role, content]` 视为二元组，
    /// 其余元素保存其 JSON 文本；其他值视为无法识别。
    pub fn from_json(value: &Value) -> CallInput<'static> {
        match value {
            Value::String(s) => CallInput::Text(Cow::Owned(s.clone())),
            Value::Array(items) => CallInput::Messages(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => InputMessage::Mapping(map.clone()),
                        Value::Array(pair) if pair.len() == 2 && pair[0].is_string() => {
                            let role = pair[0].as_str().unwrap_or_default().to_string();
                            InputMessage::Pair(Cow::Owned(role), pair[1].clone())
                        }
                        Value::String(s) => InputMessage::Other(s.clone()),
                        other => InputMessage::Other(other.to_string()),
                    })
                    .collect(),
            ),
            other => CallInput::Unknown(other.to_string()),
        }
    }
}

impl<'a> From<&'a str> for CallInput<'a> {
    fn from(text: &'a str) -> Self {
        CallInput::text(text)
    }
}

impl From<String> for CallInput<'_> {
    fn from(text: String) -> Self {
        CallInput::text(text)
    }
}

/// 调用输出，按变体顺序即归一化优先级
pub enum CallOutput<'a> {
    Generations(&'a dyn HasGenerations),
    Message(&'a dyn HasTextContent),
    Text(Cow<'a, str>),
    /// 无法识别的输出，保存其字符串形式
    Unknown(String),
}

impl<'a> CallOutput<'a> {
    pub fn text(text: impl Into<Cow<'a, str>>) -> Self {
        CallOutput::Text(text.into())
    }

    pub fn unknown(value: &impl Debug) -> Self {
        CallOutput::Unknown(format!("{:?}", value))
    }
}

impl<'a> From<&'a str> for CallOutput<'a> {
    fn from(text: &'a str) -> Self {
        CallOutput::text(text)
    }
}

impl From<String> for CallOutput<'_> {
    fn from(text: String) -> Self {
        CallOutput::text(text)
    }
}

impl<'a> From<&'a ChatResult> for CallOutput<'a> {
    fn from(result: &'a ChatResult) -> Self {
        CallOutput::Generations(result)
    }
}

impl<'a> From<&'a ChatMessage> for CallOutput<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        CallOutput::Message(message)
    }
}

/// 归一化请求，失败时返回 error 载荷
pub fn normalize_request(input: &CallInput<'_>) -> RequestPayload {
    try_normalize_request(input).unwrap_or_else(|e| RequestPayload::Error {
        error: format!("{:#}", e),
    })
}

fn try_normalize_request(input: &CallInput<'_>) -> anyhow::Result<RequestPayload> {
    let payload = match input {
        CallInput::Text(text) => RequestPayload::String {
            content: text.to_string(),
        },
        CallInput::Messages(messages) => RequestPayload::List {
            messages: messages
                .iter()
                .map(normalize_message)
                .collect::<anyhow::Result<Vec<_>>>()?,
        },
        CallInput::Unknown(repr) => RequestPayload::Unknown {
            content: repr.clone(),
        },
    };
    Ok(payload)
}

fn normalize_message(message: &InputMessage<'_>) -> anyhow::Result<MessageEntry> {
    let entry = match message {
        InputMessage::Rich(msg) => {
            MessageEntry::Typed(TypedContent::new(msg.type_name(), msg.content()?))
        }
        InputMessage::Pair(role, content) => MessageEntry::Role(RoleContent {
            role: role.to_string(),
            content: content.clone(),
        }),
        InputMessage::Mapping(map) => MessageEntry::Mapping(map.clone()),
        InputMessage::Other(repr) => MessageEntry::Text(repr.clone()),
    };
    Ok(entry)
}

/// 归一化响应，失败时返回 error 载荷
pub fn normalize_response(output: &CallOutput<'_>) -> ResponsePayload {
    try_normalize_response(output).unwrap_or_else(|e| ResponsePayload::error(format!("{:#}", e)))
}

fn try_normalize_response(output: &CallOutput<'_>) -> anyhow::Result<ResponsePayload> {
    let payload = match output {
        CallOutput::Generations(result) => {
            let messages = result.generations()?;
            if messages.is_empty() {
                return Ok(ResponsePayload::unknown(result.repr()));
            }
            // 单个 generation 取不到内容时跳过，保留其余结果
            let generations = messages
                .into_iter()
                .filter_map(|msg| match msg.content() {
                    Ok(content) => Some(TypedContent::new(msg.type_name(), content)),
                    Err(e) => {
                        tracing::warn!(kind = %msg.type_name(), "跳过无内容的 generation: {:#}", e);
                        None
                    }
                })
                .collect();
            ResponsePayload::chat_result(generations)
        }
        CallOutput::Message(msg) => ResponsePayload::message(msg.type_name(), msg.content()?),
        CallOutput::Text(text) => ResponsePayload::string(text.to_string()),
        CallOutput::Unknown(repr) => ResponsePayload::unknown(repr.as_str()),
    };
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 缺少 content 的消息
    struct BrokenMessage;

    impl HasTextContent for BrokenMessage {
        fn type_name(&self) -> Cow<'_, str> {
            Cow::Borrowed("HumanMessage")
        }

        fn content(&self) -> anyhow::Result<Value> {
            Err(anyhow::anyhow!("message has no content"))
        }
    }

    struct BrokenResult;

    impl HasGenerations for BrokenResult {
        fn generations(&self) -> anyhow::Result<Vec<&dyn HasTextContent>> {
            anyhow::bail!("generations unavailable")
        }
    }

    #[test]
    fn test_normalize_text_request() {
        let payload = normalize_request(&CallInput::from("hello"));
        assert_eq!(
            payload,
            RequestPayload::String {
                content: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_mixed_message_list() {
        let system = ChatMessage::system("你是一个有用的助手。");
        let mut mapping = Map::new();
        mapping.insert("role".to_string(), json!("user"));
        mapping.insert("content".to_string(), json!("hi"));

        let input = CallInput::Messages(vec![
            InputMessage::Rich(&system),
            InputMessage::pair("human", "h"),
            InputMessage::Mapping(mapping),
            InputMessage::other(&42),
        ]);

        let value = serde_json::to_value(normalize_request(&input)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "list",
                "messages": [
                    {"type": "SystemMessage", "content": "你是一个有用的助手。"},
                    {"role": "human", "content": "h"},
                    {"role": "user", "content": "hi"},
                    "42"
                ]
            })
        );
    }

    #[test]
    fn test_normalize_unknown_request() {
        let payload = normalize_request(&CallInput::unknown(&Some(3)));
        assert_eq!(
            payload,
            RequestPayload::Unknown {
                content: "Some(3)".to_string()
            }
        );
    }

    #[test]
    fn test_broken_message_degrades_to_error() {
        let broken = BrokenMessage;
        let input = CallInput::Messages(vec![
            InputMessage::pair("system", "s"),
            InputMessage::Rich(&broken),
        ]);

        match normalize_request(&input) {
            RequestPayload::Error { error } => assert!(error.contains("message has no content")),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_from_json_payloads() {
        let input = CallInput::from_json(&json!([
            {"role": "system", "content": "s"},
            ["human", "h"],
            "plain",
            7
        ]));
        let value = serde_json::to_value(normalize_request(&input)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "list",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "human", "content": "h"},
                    "plain",
                    "7"
                ]
            })
        );

        let unknown = normalize_request(&CallInput::from_json(&json!({"prompt": "x"})));
        assert_eq!(unknown.kind(), "unknown");
    }

    #[test]
    fn test_normalize_response_priority() {
        let result = ChatResult::new(vec![ChatMessage::ai("a"), ChatMessage::ai("b")]);
        let value = serde_json::to_value(normalize_response(&CallOutput::from(&result))).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ChatResult",
                "generations": [
                    {"type": "AIMessage", "content": "a"},
                    {"type": "AIMessage", "content": "b"}
                ]
            })
        );

        let message = ChatMessage::ai("done");
        assert_eq!(
            normalize_response(&CallOutput::from(&message)),
            ResponsePayload::message("AIMessage", "done")
        );
        assert_eq!(
            normalize_response(&CallOutput::from("text")),
            ResponsePayload::string("text")
        );
        assert_eq!(
            normalize_response(&CallOutput::unknown(&vec![1, 2])),
            ResponsePayload::unknown("[1, 2]")
        );
    }

    #[test]
    fn test_empty_chat_result_recorded_as_unknown() {
        let result = ChatResult::default();
        let payload = normalize_response(&CallOutput::from(&result));

        assert_eq!(
            payload,
            ResponsePayload::unknown("ChatResult { generations: [] }")
        );
    }

    /// 同时包含正常消息和无内容消息的结果
    struct PartialResult {
        good: ChatMessage,
    }

    impl HasGenerations for PartialResult {
        fn generations(&self) -> anyhow::Result<Vec<&dyn HasTextContent>> {
            Ok(vec![&self.good as &dyn HasTextContent, &BrokenMessage])
        }
    }

    #[test]
    fn test_generation_without_content_is_skipped() {
        let result = PartialResult {
            good: ChatMessage::ai("good"),
        };
        let payload = normalize_response(&CallOutput::Generations(&result));

        assert_eq!(
            payload,
            ResponsePayload::chat_result(vec![TypedContent::new("AIMessage", "good")])
        );
    }

    #[test]
    fn test_broken_response_degrades_to_error() {
        let payload = normalize_response(&CallOutput::Generations(&BrokenResult));
        assert_eq!(payload.kind(), "error");

        let payload = normalize_response(&CallOutput::Message(&BrokenMessage));
        assert_eq!(payload, ResponsePayload::error("message has no content"));
    }
}
