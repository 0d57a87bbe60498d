//! Language-aware recursive text splitter
//!
//! Splits on the coarsest separator that appears in the text (class and
//! function boundaries for code, headings for Markdown), recursing into any
//! piece still larger than the chunk size, then merges neighbouring pieces
//! back up to the chunk size with a character overlap.
//!
//! Sizes are measured in characters and every slice lands on a char
//! boundary, so multi-byte text never splits mid-codepoint.

use std::collections::VecDeque;

/// Separator family chosen from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Go,
    /// Java, Kotlin, C#, Scala
    Jvm,
    /// C and C++
    CFamily,
    Ruby,
    Php,
    Swift,
    Markdown,
    Html,
    Generic,
}

impl Language {
    /// Extension without the dot, any case
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" => Self::Python,
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "vue" | "svelte" => Self::JavaScript,
            "go" => Self::Go,
            "java" | "kt" | "kts" | "cs" | "scala" => Self::Jvm,
            "c" | "h" | "cc" | "cpp" | "hpp" | "cxx" => Self::CFamily,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "md" | "mdx" => Self::Markdown,
            "html" | "htm" => Self::Html,
            _ => Self::Generic,
        }
    }

    /// Separators from coarsest to finest; always ends with `""`
    pub fn separators(&self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "\nimpl ", "\npub fn ", "\nfn ", "\npub struct ", "\nstruct ", "\npub enum ",
                "\nenum ", "\ntrait ", "\nmod ", "\nconst ", "\nlet ", "\nif ", "\nwhile ",
                "\nfor ", "\nloop ", "\nmatch ", "\n\n", "\n", " ", "",
            ],
            Self::Python => &["\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", ""],
            Self::JavaScript => &[
                "\nfunction ", "\nexport ", "\nconst ", "\nlet ", "\nvar ", "\nclass ", "\nif ",
                "\nfor ", "\nwhile ", "\nswitch ", "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
            ],
            Self::Go => &[
                "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ",
                "\ncase ", "\n\n", "\n", " ", "",
            ],
            Self::Jvm => &[
                "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\nstatic ", "\nfun ",
                "\nif ", "\nfor ", "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Self::CFamily => &[
                "\nclass ", "\nvoid ", "\nint ", "\nfloat ", "\ndouble ", "\nif ", "\nfor ",
                "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Self::Ruby => &[
                "\ndef ", "\nclass ", "\nif ", "\nunless ", "\nwhile ", "\nfor ", "\ndo ",
                "\nbegin ", "\nrescue ", "\n\n", "\n", " ", "",
            ],
            Self::Php => &[
                "\nfunction ", "\nclass ", "\nif ", "\nforeach ", "\nwhile ", "\ndo ",
                "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Self::Swift => &[
                "\nfunc ", "\nclass ", "\nstruct ", "\nenum ", "\nif ", "\nfor ", "\nwhile ",
                "\ndo ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
            ],
            Self::Markdown => &[
                "\n# ", "\n## ", "\n### ", "\n#### ", "\n```\n", "\n\n", "\n", " ", "",
            ],
            Self::Html => &[
                "<body", "<div", "<section", "<p", "<li", "<h1", "<h2", "<h3", "<table", "<tr",
                "\n\n", "\n", " ", "",
            ],
            Self::Generic => &["\n\n", "\n", " ", ""],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` chars
    pub fn split(&self, text: &str, language: Language) -> Vec<String> {
        self.split_text(text, language.separators())
    }

    fn split_text(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Coarsest separator present in the text; "" always applies
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.extend(self.merge(&[piece]));
            } else {
                chunks.extend(self.split_text(piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily join pieces up to `chunk_size`, carrying up to
    /// `chunk_overlap` chars of trailing pieces into the next chunk
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if !window.is_empty() {
            push_chunk(&mut chunks, &window);
        }
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split before each occurrence of `separator`, keeping it at the start of
/// the following piece. `""` splits into single chars. Concatenating the
/// pieces yields `text`.
fn split_keep_start<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
            start = pos;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_text_is_one_chunk() {
        let chunker = RecursiveChunker::new(100, 20);
        let chunks = chunker.split("fn main() {}\n", Language::Rust);
        assert_eq!(chunks, vec!["fn main() {}".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = RecursiveChunker::new(100, 20);
        assert!(chunker.split("", Language::Generic).is_empty());
        assert!(chunker.split("   \n\n  ", Language::Generic).is_empty());
    }

    #[test]
    fn test_python_splits_on_definitions() {
        let chunker = RecursiveChunker::new(40, 0);
        let text = "import os\n\ndef alpha():\n    return 1\n\ndef beta():\n    return 2\n";
        let chunks = chunker.split(text, Language::Python);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("def alpha"));
        assert!(chunks[1].starts_with("def beta"));
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let chunker = RecursiveChunker::new(20, 8);
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunker.split(text, Language::Generic);
        assert!(chunks.len() > 1);
        // the last word of a chunk opens the next one
        let first_tail = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(first_tail));
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let chunker = RecursiveChunker::new(7, 3);
        let text = "한국어 문서를 잘게 나누어도 안전합니다 ✓✓✓✓✓✓✓✓✓✓";
        let chunks = chunker.split(text, Language::Markdown);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("tsx"), Language::JavaScript);
        assert_eq!(Language::from_extension("kt"), Language::Jvm);
        assert_eq!(Language::from_extension("toml"), Language::Generic);
        assert_eq!(Language::from_extension(""), Language::Generic);
    }

    #[test]
    fn test_split_keep_start_reassembles() {
        let text = "a\n\nb\n\n\n\nc";
        assert_eq!(split_keep_start(text, "\n\n").concat(), text);
        assert_eq!(split_keep_start("héllo", "").len(), 5);
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_size(text in "\\PC{0,400}", size in 5usize..60, overlap in 0usize..10) {
            let chunker = RecursiveChunker::new(size, overlap);
            for chunk in chunker.split(&text, Language::Generic) {
                prop_assert!(chunk.chars().count() <= size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }
}
