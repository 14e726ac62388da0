//! Paragraph chunking for ingest.

/// Character cap per record when none is given on the command line.
pub const DEFAULT_MAX_CHARS: usize = 2000;

/// Split `text` on blank lines and cap each piece at `max_chars` characters.
///
/// Empty paragraphs are dropped. Oversized paragraphs are cut into
/// consecutive `max_chars`-character pieces, so no record ever exceeds the
/// cap and no text is lost.
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut chunks = Vec::new();
    for paragraph in text.split("\n\n") {
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.chars().count() <= max {
            chunks.push(paragraph.to_string());
            continue;
        }
        let chars: Vec<char> = paragraph.chars().collect();
        for piece in chars.chunks(max) {
            chunks.push(piece.iter().collect());
        }
    }
    chunks
}
