use std::path::PathBuf;

/// 启用开关的环境变量名
pub const ENABLED_KEY: &str = "LLM_RECORD_ENABLED";
/// 记录目录的环境变量名
pub const DIR_KEY: &str = "LLM_RECORD_DIR";

/// 调用记录器配置
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// 记录目录
    pub record_dir: PathBuf,

    /// 是否启用记录
    pub enabled: bool,
}

fn default_record_dir() -> PathBuf {
    PathBuf::from("data/llm_records")
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_dir: default_record_dir(),
            enabled: false,
        }
    }
}

impl RecorderConfig {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值查找函数读取配置
    ///
    /// `LLM_RECORD_ENABLED` 忽略大小写等于 "true" 时启用，其他值或未设置均视为关闭。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup(ENABLED_KEY)
            .map(|v| parse_enabled(&v))
            .unwrap_or(false);
        let record_dir = lookup(DIR_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_record_dir);

        Self {
            record_dir,
            enabled,
        }
    }

    /// 指定记录目录
    pub fn with_record_dir(mut self, record_dir: impl Into<PathBuf>) -> Self {
        self.record_dir = record_dir.into();
        self
    }

    /// 指定启用状态
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn parse_enabled(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_enabled_is_case_insensitive() {
        for value in ["true", "TRUE", "True"] {
            let config = RecorderConfig::from_lookup(lookup_from(&[(ENABLED_KEY, value)]));
            assert!(config.enabled, "{} should enable recording", value);
        }
    }

    #[test]
    fn test_other_values_disable() {
        for value in ["false", "1", "yes", "", " true"] {
            let config = RecorderConfig::from_lookup(lookup_from(&[(ENABLED_KEY, value)]));
            assert!(!config.enabled, "{:?} should not enable recording", value);
        }

        let config = RecorderConfig::from_lookup(lookup_from(&[]));
        assert!(!config.enabled);
        assert_eq!(config, RecorderConfig::default());
    }

    #[test]
    fn test_record_dir_override() {
        let config = RecorderConfig::from_lookup(lookup_from(&[(DIR_KEY, "/tmp/records")]));
        assert_eq!(config.record_dir, PathBuf::from("/tmp/records"));

        let config = RecorderConfig::from_lookup(lookup_from(&[(DIR_KEY, "  ")]));
        assert_eq!(config.record_dir, PathBuf::from("data/llm_records"));
    }
}
