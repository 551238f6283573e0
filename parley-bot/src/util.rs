//! Text helpers shared by channels and the dispatcher.

/// Discord's message length limit, in characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Breaks fall on line boundaries where possible; a single line longer than
/// the limit is cut at character boundaries. Concatenating the chunks gives
/// back the original text.
#[must_use]
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            for ch in line.chars() {
                if current_len == max_chars {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The first `max_chars` characters of `s`.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(idx, _)| &s[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_into_chunks("hello", 2000), vec!["hello"]);
        assert_eq!(split_into_chunks("", 2000), vec![""]);
    }

    #[test]
    fn test_split_prefers_line_breaks() {
        let text = "line one\nline two\nline three";
        let chunks = split_into_chunks(text, 12);
        assert_eq!(chunks, vec!["line one\n", "line two\n", "line three"]);
    }

    #[test]
    fn test_split_at_discord_limit() {
        let text = "ab".repeat(2500);
        let chunks = split_into_chunks(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= DISCORD_MESSAGE_LIMIT));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_multibyte_safe() {
        let text = "é".repeat(25);
        let chunks = split_into_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hi", 5), "hi");
        assert_eq!(truncate_str("日本語テキスト", 3), "日本語");
    }
}
