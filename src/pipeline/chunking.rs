//! Text chunking for model context-window limits.
//!
//! Two strategies: paragraph packing (summaries, where each chunk should read
//! as a unit) and recursive splitting with overlap (requirement extraction,
//! where a rule straddling a boundary must still be seen whole once).

use std::collections::VecDeque;

/// Separators tried in order by [`RecursiveSplitter`]; `""` splits characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Pack blank-line separated paragraphs into chunks below `max_chars`.
///
/// A paragraph that cannot fit on its own is cut into `max_chars` pieces.
pub fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(4);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if current.len() + para.len() + 2 < max_chars {
            current.push_str(para);
            current.push_str("\n\n");
            continue;
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim_end().to_string());
        }
        current.clear();

        if para.len() + 2 < max_chars {
            current.push_str(para);
            current.push_str("\n\n");
        } else {
            chunks.extend(hard_split(para, max_chars).into_iter().map(str::to_string));
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

/// Cut `text` into pieces of at most `max_bytes`, on char boundaries.
fn hard_split(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            pieces.push(rest);
            break;
        }
        let mut cut = max_bytes;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // A single char wider than the limit.
            cut = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    pieces
}

/// Splits on progressively finer separators and merges pieces back up to
/// `chunk_size`, repeating up to `overlap` bytes of trailing pieces at the
/// start of the next chunk.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if piece.len() < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = separator.len();
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = piece.len();
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);
                while total > self.overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= first.len() + if window.is_empty() { 0 } else { sep_len };
                }
            }
            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Rough token count (4 characters per token) for logging prompt sizes.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_pack_in_order() {
        let text = "Rule one.\n\nRule two.\n\nRule three.";
        let chunks = chunk_paragraphs(text, 1000);
        assert_eq!(chunks, vec!["Rule one.\n\nRule two.\n\nRule three."]);
    }

    #[test]
    fn paragraphs_split_when_full() {
        let para = "x".repeat(40);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_paragraphs(&text, 90);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() < 90));
        assert!(chunks[0].starts_with('x'));
    }

    #[test]
    fn oversize_paragraph_is_cut_completely() {
        let text = "a".repeat(250);
        let chunks = chunk_paragraphs(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 250);
        assert!(chunks.iter().all(|c| c.len() <= 100));
    }

    #[test]
    fn hard_split_respects_utf8() {
        let text = "é".repeat(10); // 20 bytes
        let pieces = hard_split(&text, 5);
        assert!(pieces.iter().all(|p| p.len() <= 5));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_paragraphs("  \n\n  ", 100).is_empty());
        assert!(RecursiveSplitter::new(100, 10).split("").is_empty());
    }

    #[test]
    fn recursive_splitter_keeps_chunks_within_size() {
        let text = (0..200)
            .map(|i| format!("Sentence number {i} about reporting thresholds."))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = RecursiveSplitter::new(200, 40);
        let chunks = splitter.split(&text);
        assert!(chunks.len() > 10);
        assert!(chunks.iter().all(|c| c.len() <= 200));
        assert!(chunks[0].starts_with("Sentence number 0"));
    }

    #[test]
    fn recursive_splitter_overlaps_neighbours() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = RecursiveSplitter::new(20, 10).split(text);
        assert!(chunks.len() > 2);
        // The next chunk opens with words carried over from the previous one.
        let head = chunks[1].split(' ').next().unwrap();
        assert!(chunks[0].split(' ').any(|w| w == head));
    }

    #[test]
    fn recursive_splitter_prefers_paragraphs() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = RecursiveSplitter::new(20, 0).split(text);
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn recursive_splitter_breaks_unspaced_text() {
        let text = "z".repeat(45);
        let chunks = RecursiveSplitter::new(20, 0).split(&text);
        assert!(chunks.iter().all(|c| c.len() <= 20));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
