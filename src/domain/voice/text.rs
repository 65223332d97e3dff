use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)\]]+").expect("valid url pattern"));

// [label](target) keeps only the label
static MARKDOWN_LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link pattern"));

static MARKDOWN_MARKUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}(#{1,6}|>|[-*+]|\d+\.)\s+|[*_`~]+").expect("valid markup pattern"));

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

static SENTENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid sentence pattern"));

/// Turn an assistant reply into plain text worth speaking: markdown removed,
/// URLs dropped, whitespace collapsed.
pub fn prepare_for_speech(text: &str) -> String {
    let without_links = MARKDOWN_LINK_PATTERN.replace_all(text, "$1");
    let without_urls = URL_PATTERN.replace_all(&without_links, "");
    let without_markup = MARKDOWN_MARKUP_PATTERN.replace_all(&without_urls, "");
    let normalized = WHITESPACE_PATTERN.replace_all(&without_markup, " ");

    normalized.trim().to_string()
}

/// Split text into provider-sized batches of at most `max_chars` characters,
/// preferring sentence boundaries.
pub fn split_into_batches(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut batches = Vec::new();
    let mut current = String::new();
    let mut last_end = 0;

    let mut sentences: Vec<&str> = SENTENCE_PATTERN
        .find_iter(text)
        .map(|mat| {
            let sentence = &text[last_end..mat.end()];
            last_end = mat.end();
            sentence
        })
        .collect();
    if last_end < text.len() {
        sentences.push(&text[last_end..]);
    }

    for sentence in sentences {
        let sentence_len = sentence.chars().count();

        if !current.is_empty() && current.chars().count() + sentence_len > max_chars {
            push_trimmed(&mut batches, &current);
            current.clear();
        }

        if sentence_len > max_chars {
            // No usable boundary, fall back to fixed-size chunks
            let chars: Vec<char> = sentence.chars().collect();
            for chunk in chars.chunks(max_chars) {
                push_trimmed(&mut batches, &chunk.iter().collect::<String>());
            }
        } else {
            current.push_str(sentence);
        }
    }

    push_trimmed(&mut batches, &current);
    batches
}

fn push_trimmed(batches: &mut Vec<String>, batch: &str) {
    let trimmed = batch.trim();
    if !trimmed.is_empty() {
        batches.push(trimmed.to_string());
    }
}
