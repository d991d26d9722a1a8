//! Splits outbound text into transport-sized pieces while preserving structure.
//!
//! The input is segmented into alternating prose and fenced code-block
//! spans, packed greedily into chunks up to a limit, and any segment that
//! doesn't fit alone is split further (code along line boundaries keeping
//! its fence, prose by paragraph → sentence → clause → word → hard slice).
//! A final pass merges a short trailing chunk into its predecessor when the
//! merge still fits. Pure and deterministic — no I/O, no transport knowledge.

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Prose(String),
    /// `(opener, body, closer)` — opener carries the language tag, e.g. "```rust".
    Code {
        opener: String,
        body: String,
        closer: String,
    },
}

/// Split `text` into chunks no longer than `limit` characters, merging a
/// short trailing chunk into its predecessor when the combination still
/// fits and the trailing chunk is under `min_chunk_size`.
pub fn chunk(text: &str, limit: usize, min_chunk_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let segments = segment(text);
    let mut pieces: Vec<String> = Vec::new();
    for seg in segments {
        match seg {
            Segment::Prose(p) => pieces.extend(split_prose(&p, limit)),
            Segment::Code {
                opener,
                body,
                closer,
            } => pieces.extend(split_code(&opener, &body, &closer, limit)),
        }
    }

    let packed = pack(pieces, limit);
    merge_short_tail(packed, limit, min_chunk_size)
}

/// Separate `text` into alternating prose and fenced code-block segments.
fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(FENCE) {
        if start > 0 {
            segments.push(Segment::Prose(rest[..start].to_string()));
        }
        let after_open = &rest[start..];
        // Opener runs to the end of its line (captures the language tag, if any).
        let opener_end = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
        let opener = after_open[..opener_end].trim_end_matches('\n').to_string();
        let body_start = opener_end;

        match after_open[body_start..].find(FENCE) {
            Some(close_rel) => {
                let body = after_open[body_start..body_start + close_rel].to_string();
                let close_start = body_start + close_rel;
                let after_close = &after_open[close_start..];
                let closer_end = after_close
                    .find('\n')
                    .map(|i| i + 1)
                    .unwrap_or(after_close.len());
                let closer = after_close[..closer_end].to_string();
                segments.push(Segment::Code {
                    opener,
                    body,
                    closer: closer.trim_end().to_string(),
                });
                rest = &after_close[closer_end..];
            }
            None => {
                // Unterminated fence — treat the remainder as prose rather
                // than silently dropping it.
                segments.push(Segment::Prose(after_open.to_string()));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Prose(rest.to_string()));
    }
    segments
}

/// Greedily pack whole pieces into chunks up to `limit`.
fn pack(pieces: Vec<String>, limit: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if piece.len() > limit {
            // Shouldn't happen — splitters below guarantee pieces fit — but
            // never silently truncate; emit it as its own oversized chunk.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(piece);
            continue;
        }
        if current.is_empty() {
            current = piece;
        } else if current.len() + piece.len() <= limit {
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = piece;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Merge the final chunk into its predecessor when it's under
/// `min_chunk_size` and the merge still fits `limit`.
fn merge_short_tail(mut chunks: Vec<String>, limit: usize, min_chunk_size: usize) -> Vec<String> {
    loop {
        if chunks.len() < 2 {
            return chunks;
        }
        let last_len = chunks.last().unwrap().len();
        if last_len >= min_chunk_size {
            return chunks;
        }
        let tail = chunks.pop().unwrap();
        let prev_len = chunks.last().unwrap().len();
        if prev_len + tail.len() <= limit {
            chunks.last_mut().unwrap().push_str(&tail);
        } else {
            chunks.push(tail);
            return chunks;
        }
    }
}

/// Split a code block that's too large for one chunk into several
/// separately-fenced blocks, preserving opener/closer on each piece.
fn split_code(opener: &str, body: &str, closer: &str, limit: usize) -> Vec<String> {
    let overhead = opener.len() + closer.len() + 2; // + newlines around the body
    if overhead + body.len() <= limit {
        return vec![format!("{opener}\n{body}{closer}")];
    }
    let budget = limit.saturating_sub(overhead).max(1);

    let mut out = Vec::new();
    let mut current = String::new();
    for line in body.split_inclusive('\n') {
        if current.len() + line.len() > budget && !current.is_empty() {
            out.push(format!("{opener}\n{current}{closer}"));
            current = String::new();
        }
        if line.len() > budget {
            // A single line longer than the budget — hard-slice it.
            for slice in hard_slice(line, budget) {
                out.push(format!("{opener}\n{slice}{closer}"));
            }
            continue;
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        out.push(format!("{opener}\n{current}{closer}"));
    }
    out
}

/// Split prose recursively: paragraph → sentence → clause → word → hard slice.
fn split_prose(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    split_by(text, "\n\n", limit, |p| split_by_sentence(p, limit))
}

fn split_by_sentence(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    split_on_boundary(text, &['.', '?', '!'], limit, |p| split_by_clause(p, limit))
}

fn split_by_clause(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    split_on_boundary(text, &[',', ';', ':'], limit, |p| split_by_word(p, limit))
}

fn split_by_word(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    let words: Vec<&str> = text.split_inclusive(' ').collect();
    let mut out = Vec::new();
    let mut current = String::new();
    for word in words {
        if word.len() > limit {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.extend(hard_slice(word, limit));
            continue;
        }
        if current.len() + word.len() > limit {
            out.push(std::mem::take(&mut current));
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Split `text` by blank-line paragraphs, falling back to `recurse` for any
/// paragraph that's still too long on its own.
fn split_by(
    text: &str,
    separator: &str,
    limit: usize,
    recurse: impl Fn(&str) -> Vec<String>,
) -> Vec<String> {
    let parts: Vec<&str> = text.split(separator).collect();
    let mut pieces = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let with_sep = if i + 1 < parts.len() {
            format!("{part}{separator}")
        } else {
            part.to_string()
        };
        if with_sep.len() <= limit {
            pieces.push(with_sep);
        } else {
            pieces.extend(recurse(&with_sep));
        }
    }
    pack(pieces, limit)
}

/// Split on the first boundary character found after each `limit`-sized
/// span, keeping the boundary with the preceding text.
fn split_on_boundary(
    text: &str,
    boundaries: &[char],
    limit: usize,
    recurse: impl Fn(&str) -> Vec<String>,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        // Search for the last boundary char within the limit window.
        let window = &rest[..limit.min(rest.len())];
        let cut = window
            .char_indices()
            .filter(|(_, c)| boundaries.contains(c))
            .map(|(i, c)| i + c.len_utf8())
            .last();
        match cut {
            Some(at) if at > 0 => {
                out.push(rest[..at].to_string());
                rest = &rest[at..];
            }
            _ => {
                // No boundary in range — fall back to word/hard-slice splitting.
                out.extend(recurse(rest));
                rest = "";
                break;
            }
        }
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Slice `text` into `limit`-sized pieces on character boundaries (never
/// splits a multi-byte UTF-8 codepoint).
fn hard_slice(text: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    while start < bytes.len() {
        let mut end = (start + limit).min(bytes.len());
        while end < bytes.len() && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            end = (start + 1).min(bytes.len());
        }
        out.push(text[start..end].to_string());
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unchanged() {
        let out = chunk("hello world", 2000, 100);
        assert_eq!(out, vec!["hello world".to_string()]);
    }

    #[test]
    fn packs_prose_paragraphs_greedily() {
        let text = format!("{}\n\n{}\n\n{}", "a".repeat(40), "b".repeat(40), "c".repeat(40));
        let out = chunk(&text, 90, 10);
        assert!(out.iter().all(|c| c.len() <= 90));
        assert!(out.len() >= 2);
    }

    #[test]
    fn splits_oversized_code_block_preserving_fence() {
        let body: String = (0..50).map(|i| format!("line{i}\n")).collect();
        let text = format!("```rust\n{body}```");
        let out = chunk(&text, 80, 10);
        assert!(out.len() > 1);
        for piece in &out {
            assert!(piece.starts_with("```rust"));
            assert!(piece.trim_end().ends_with("```"));
            assert!(piece.len() <= 80 || piece.lines().count() <= 2);
        }
    }

    #[test]
    fn hard_slices_a_single_giant_word() {
        let word = "x".repeat(500);
        let out = chunk(&word, 100, 10);
        assert!(out.iter().all(|c| c.len() <= 100));
        assert_eq!(out.join(""), word);
    }

    #[test]
    fn merges_short_trailing_chunk() {
        let text = format!("{}\n\n{}", "a".repeat(95), "b");
        let out = chunk(&text, 100, 10);
        // "b" alone is below min_chunk_size and the merge (95 + sep + 1) fits under 100?
        // it may not fit — either way the invariant is no chunk exceeds the limit.
        assert!(out.iter().all(|c| c.len() <= 100));
    }

    #[test]
    fn never_drops_content() {
        let text = "para one.\n\npara two with, a clause; and more: detail. ".repeat(20);
        let out = chunk(&text, 60, 10);
        let total_len: usize = out.iter().map(|c| c.len()).sum();
        assert!(total_len >= text.len());
        assert!(out.iter().all(|c| c.len() <= 60 || !c.contains(' ')));
    }
}
