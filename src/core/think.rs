//! # Thinking Extraction
//!
//! Reasoning models served through Dify emit their chain of thought inline,
//! wrapped in `<think>…</think>`. The answer shown to the user must not
//! contain those blocks; their trimmed text is kept separately so the UI can
//! show it collapsed.
//!
//! ```text
//! "<think> plan </think>Answer"  →  content: "Answer", thinking: Some("plan")
//! ```

use std::sync::LazyLock;

use regex::Regex;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think regex"));

/// An answer split into displayable content and reasoning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkingSplit {
    /// The answer with every think block removed.
    pub content: String,
    /// Inner text of all think blocks, trimmed and joined by a blank line.
    /// `None` when the answer had no think block.
    pub thinking: Option<String>,
}

/// Split a complete answer. Blocks are matched non-greedily, so text between
/// two blocks stays in the content in its original order.
pub fn split_thinking(raw: &str) -> ThinkingSplit {
    let parts: Vec<&str> = THINK_BLOCK
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect();

    if parts.is_empty() {
        return ThinkingSplit {
            content: raw.to_string(),
            thinking: None,
        };
    }

    ThinkingSplit {
        content: THINK_BLOCK.replace_all(raw, "").into_owned(),
        thinking: Some(parts.join("\n\n")),
    }
}

/// Split an answer that may still be streaming. Same as [`split_thinking`],
/// plus a trailing `<think>` without its closing tag is treated as reasoning
/// in progress rather than answer text, and a tag that has only partly
/// arrived (`"<thi"`) is held back.
pub fn split_streaming(raw: &str) -> ThinkingSplit {
    let mut split = split_thinking(raw);

    let Some(open) = split.content.rfind(OPEN_TAG) else {
        let held = partial_tag_len(&split.content, OPEN_TAG);
        split.content.truncate(split.content.len() - held);
        return split;
    };

    let mut partial = &split.content[open + OPEN_TAG.len()..];
    partial = &partial[..partial.len() - partial_tag_len(partial, CLOSE_TAG)];
    let partial = partial.trim().to_string();
    split.content.truncate(open);
    split.thinking = Some(match split.thinking.take() {
        Some(done) if partial.is_empty() => done,
        Some(done) => format!("{done}\n\n{partial}"),
        None => partial,
    });
    split
}

/// Length of the longest proper prefix of `tag` that `text` ends with.
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.ends_with(&tag[..n]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_think_block_leaves_content_untouched() {
        let split = split_thinking("Plain answer");
        assert_eq!(split.content, "Plain answer");
        assert_eq!(split.thinking, None);
    }

    #[test]
    fn test_single_block_is_removed_and_trimmed() {
        let split = split_thinking("<think>\n  step one\n</think>\n\nThe answer is 4.");
        assert_eq!(split.content, "\n\nThe answer is 4.");
        assert_eq!(split.thinking.as_deref(), Some("step one"));
    }

    #[test]
    fn test_multiple_blocks_join_with_blank_line() {
        let split = split_thinking("<think>a</think>first <think> b </think>second");
        assert_eq!(split.content, "first second");
        assert_eq!(split.thinking.as_deref(), Some("a\n\nb"));
    }

    #[test]
    fn test_empty_block_still_counts_as_thinking() {
        let split = split_thinking("<think></think>Hi");
        assert_eq!(split.content, "Hi");
        assert_eq!(split.thinking.as_deref(), Some(""));
    }

    #[test]
    fn test_thinking_is_never_in_content() {
        let raw = "<think>secret plan</think>visible<think>more secret</think>";
        let split = split_thinking(raw);
        assert!(!split.content.contains("secret"));
        assert!(!split.content.contains("<think>"));
        for part in split.thinking.unwrap().split("\n\n") {
            assert!(raw.contains(part));
        }
    }

    #[test]
    fn test_unclosed_block_is_content_when_complete() {
        // A finished answer with a dangling tag is left alone
        let split = split_thinking("<think>never closed");
        assert_eq!(split.content, "<think>never closed");
        assert_eq!(split.thinking, None);
    }

    #[test]
    fn test_streaming_hides_unclosed_block() {
        let split = split_streaming("<think>working on i");
        assert_eq!(split.content, "");
        assert_eq!(split.thinking.as_deref(), Some("working on i"));
    }

    #[test]
    fn test_streaming_keeps_closed_blocks_and_partial() {
        let split = split_streaming("<think>one</think>Answer <think>two so fa");
        assert_eq!(split.content, "Answer ");
        assert_eq!(split.thinking.as_deref(), Some("one\n\ntwo so fa"));
    }

    #[test]
    fn test_streaming_holds_back_half_arrived_tags() {
        assert_eq!(split_streaming("<thi").content, "");
        assert_eq!(split_streaming("Answer <").content, "Answer ");
        assert_eq!(split_streaming("a <b> c").content, "a <b> c");

        let split = split_streaming("<think>still going</thi");
        assert_eq!(split.content, "");
        assert_eq!(split.thinking.as_deref(), Some("still going"));
    }

    #[test]
    fn test_streaming_matches_complete_split_once_closed() {
        let raw = "<think>x</think>done";
        assert_eq!(split_streaming(raw), split_thinking(raw));
    }
}
