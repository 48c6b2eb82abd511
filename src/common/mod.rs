//! 公共工具模块

/// 生成单行预览：空白折叠为单个空格，超过 `max_chars` 个字符时截断并追加 "..."
///
/// 按字符而非字节截断，不会切开多字节字符
pub fn preview(s: &str, max_chars: usize) -> String {
    let single_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    match single_line.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &single_line[..idx]),
        None => single_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(preview("股票\n投资  基础", 100), "股票 投资 基础");
    }

    #[test]
    fn test_preview_truncates_by_char() {
        assert_eq!(preview("你好世界", 2), "你好...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
