//! Reply chunking for Discord's message size limit
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Count characters instead of bytes, drop embed helpers
//! - 1.0.0: Extracted from the command handler

/// Discord message content limit, in characters
pub const MESSAGE_LIMIT: usize = 2000;

const ELLIPSIS: &str = "...";

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Prefers line boundaries; a single line longer than the limit is cut at
/// character boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        // +1 for the newline joining it to what came before
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= max_chars {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let mut pieces = split_chars(line, max_chars);
            // Keep the tail open so following short lines can join it
            if let Some(last) = pieces.pop() {
                chunks.extend(pieces);
                current_len = last.chars().count();
                current = last;
            }
        } else {
            current.push_str(line);
            current_len = line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_chars(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Chunk a reply so each piece can be posted as one message
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}

/// Cut text to the message limit, ending in an ellipsis when shortened
pub fn truncate_for_message(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let kept: String = text.chars().take(MESSAGE_LIMIT - ELLIPSIS.len()).collect();
    format!("{kept}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 100), vec!["hello"]);
        assert_eq!(chunk_text("", 100), vec![""]);
    }

    #[test]
    fn test_chunk_respects_lines() {
        let result = chunk_text("line1\nline2\nline3", 12);
        assert_eq!(result, vec!["line1\nline2", "line3"]);
    }

    #[test]
    fn test_long_line_is_cut() {
        let result = chunk_text(&"a".repeat(100), 30);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|c| c.chars().count() <= 30));
        assert_eq!(result.concat(), "a".repeat(100));
    }

    #[test]
    fn test_exactly_at_limit() {
        let text = "a".repeat(MESSAGE_LIMIT);
        assert_eq!(chunk_for_message(&text), vec![text]);
    }

    #[test]
    fn test_multibyte_counts_characters() {
        // 1500 characters but 4500 bytes
        let text = "世".repeat(1500);
        assert_eq!(chunk_for_message(&text).len(), 1);

        let lines = vec!["⏰ ".repeat(400); 5].join("\n");
        for chunk in chunk_for_message(&lines) {
            assert!(chunk.chars().count() <= MESSAGE_LIMIT);
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_for_message("short"), "short");

        let result = truncate_for_message(&"é".repeat(2500));
        assert_eq!(result.chars().count(), MESSAGE_LIMIT);
        assert!(result.ends_with("..."));
    }
}
