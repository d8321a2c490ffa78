use unicode_segmentation::UnicodeSegmentation;

// Counted in characters, the unit of the platform's text limits.
const MAX_PROMPT_CHARS: usize = 100;
const PROMPT_FORBIDDEN_CHARS: [char; 3] = ['"', '(', ')'];

/// Name a user picked on the messaging platform. Untrusted text, stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: String) -> DisplayName {
        Self(name)
    }

    /// Version of the name that is safe to quote inside an approval prompt.
    ///
    /// Quotes and parentheses are dropped so the subscriber token stays the first
    /// parenthesised group of the prompt. The result is capped at 100 characters
    /// without splitting a grapheme cluster.
    pub fn for_prompt(&self) -> String {
        let mut char_count = 0;

        self.0
            .graphemes(true)
            .filter(|grapheme| !grapheme.chars().any(|c| PROMPT_FORBIDDEN_CHARS.contains(&c)))
            .take_while(|grapheme| {
                char_count += grapheme.chars().count();
                char_count <= MAX_PROMPT_CHARS
            })
            .collect()
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
