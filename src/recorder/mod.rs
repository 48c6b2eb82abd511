//! LLM 调用记录模块
//!
//! 将每次 LLM 调用的输入、输出、耗时、token 与成本持久化为独立的 JSON 文件，
//! 用于审计和调试。记录是旁路逻辑，任何失败都不会影响调用方。

pub mod config;
pub mod model;
pub mod normalize;
pub mod store;

pub use config::RecorderConfig;
pub use model::{CallRecord, LlmCall, MessageEntry, RequestPayload, ResponsePayload};
pub use normalize::{
    CallInput, CallOutput, ChatMessage, ChatResult, HasGenerations, HasTextContent, InputMessage,
};
pub use store::{CallRecorder, RecorderStats, global_recorder, init_global_recorder};
