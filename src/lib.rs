//! LLM 调用记录器
//!
//! 记录大模型调用的输入输出内容及耗时、token、成本等元数据。

pub mod common;
pub mod recorder;

pub use recorder::{
    CallInput, CallOutput, CallRecord, CallRecorder, LlmCall, RecorderConfig, global_recorder,
    init_global_recorder,
};
