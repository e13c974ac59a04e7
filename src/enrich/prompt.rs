use std::path::Path;

/// Built-in prompt used when no prompt file exists.
pub const DEFAULT_TEMPLATE: &str = "\
당신은 로봇 산업 전문 뉴스 에디터입니다. 아래 영문 기사의 제목을 한국어로 번역하고 내용을 요약하세요.

[규칙]
1. 출력은 반드시 `번역된 제목 ||| 요약` 형식의 한 줄이어야 합니다.
2. 마크다운 기호(**, #, - 등)를 쓰지 마세요.
3. 요약은 최대 3문장이며, 모든 문장은 '~함', '~임', '~전망'처럼 명사형으로 끝내세요.
4. 원문에 없는 내용을 지어내지 마세요.

[기사]
제목: {title}
내용: {snippet}
";

/// Prompt text with `{title}` and `{snippet}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Read the template from `path`, or use [`DEFAULT_TEMPLATE`] when the
    /// file is missing, unreadable or blank.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "Loaded prompt template");
                Self::new(text)
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Prompt file is empty, using built-in prompt");
                Self::default()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No prompt file, using built-in prompt");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read prompt file, using built-in prompt");
                Self::default()
            }
        }
    }

    /// Substitute both placeholders in one pass, so braces inside the
    /// substituted text are never expanded again.
    pub fn render(&self, title: &str, snippet: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + title.len() + snippet.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{title}") {
                out.push_str(title);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{snippet}") {
                out.push_str(snippet);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}
