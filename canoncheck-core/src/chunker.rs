//! Word-window chunking of story text.

use crate::error::ChunkError;
use crate::types::Chunk;

/// Default window size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 700;

/// Default number of words shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 120;

/// Split `text` into overlapping windows of `size` words.
///
/// Windows advance by `size - overlap` words. The last window may be short,
/// and no window is emitted once the previous one already reached the end of
/// the text. Text with no words yields no chunks.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    if size == 0 {
        return Err(ChunkError::ZeroSize);
    }
    if overlap >= size {
        return Err(ChunkError::OverlapTooLarge { size, overlap });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(Chunk {
            index: chunks.len(),
            text: words[start..end].join(" "),
        });
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn expected_count(n: usize, size: usize, overlap: usize) -> usize {
        if n <= size {
            1
        } else {
            (n - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk("Alice lived in Paris.", 10, 2).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Alice lived in Paris.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunks = chunk("  a\tb\n\nc  ", 2, 0).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b", "c"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk("   ", 5, 1).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(chunk("a b", 0, 0), Err(ChunkError::ZeroSize));
        assert_eq!(
            chunk("a b", 3, 3),
            Err(ChunkError::OverlapTooLarge {
                size: 3,
                overlap: 3
            })
        );
    }

    #[test]
    fn test_overlap_windows() {
        let chunks = chunk(&words(10), 4, 1).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]
        );
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        for n in 1..60 {
            for size in 1..9 {
                for overlap in 0..size {
                    let chunks = chunk(&words(n), size, overlap).unwrap();
                    assert_eq!(
                        chunks.len(),
                        expected_count(n, size, overlap),
                        "n={n} size={size} overlap={overlap}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_deoverlapped_chunks_reconstruct_tokens() {
        let text = words(37);
        let (size, overlap) = (6, 2);
        let chunks = chunk(&text, size, overlap).unwrap();

        let mut rebuilt: Vec<String> = Vec::new();
        for (i, c) in chunks.iter().enumerate() {
            let toks = c.text.split(' ').map(str::to_string);
            if i == 0 {
                rebuilt.extend(toks);
            } else {
                rebuilt.extend(toks.skip(overlap));
            }
            assert!(!c.text.is_empty());
            assert_eq!(c.index, i);
        }
        let words: Vec<String> = text.split(' ').map(str::to_string).collect();
        assert_eq!(rebuilt, words);
    }
}
