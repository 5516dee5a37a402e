//! Word-window chunking: the fallback used when an encoder has no
//! tokenizer of its own.
//!
//! Splits text into overlapping windows of whitespace-delimited words so
//! arbitrarily long articles can be embedded chunk-by-chunk and pooled.

/// Split `text` into overlapping chunks of at most `chunk_size` words.
///
/// Consecutive chunks share `overlap` words of context. Text that fits
/// in one window is returned whole. `overlap` is clamped below
/// `chunk_size` so the window always advances.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size - overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}
