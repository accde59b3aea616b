//! Markdown structuring: raw pdfium page text → Markdown.
//!
//! pdfium hands back a page's text in reading order with one line per
//! visual line and no notion of structure. This module recovers the little
//! structure that can be recovered deterministically:
//!
//! - bullet glyphs become `- ` list items, `1)` / `1.` items become `1. `;
//! - short title-like lines become headings (ALL CAPS lines and numbered
//!   sections such as `2.1 Scope`);
//! - a line starting in lowercase continues the previous line; a trailing
//!   hyphen between two word halves is removed.
//!
//! Everything else keeps its line breaks. The downstream consumer is a
//! language model, which copes with ragged lines far better than with two
//! table cells glued into one sentence.
//!
//! [`clean_markdown`] then applies the document-level cleanup passes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest line still considered for heading promotion.
const MAX_HEADING_CHARS: usize = 80;

#[derive(Debug, PartialEq)]
enum Block {
    Heading(usize, String),
    Bullet(String),
    Numbered(String, String),
    Text(String),
    Break,
}

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[•●▪◦■–\*\-]\s+(\S.*)$").unwrap());

static RE_NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(\S.*)$").unwrap());

/// Dotted section numbers only (`2.1 Scope`); `10 Downing Street` stays text.
static RE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}((?:\.\d{1,2})+)\.?\s+\p{Lu}").unwrap());

/// Convert one page of extracted text to Markdown (no trailing newline).
pub fn page_to_markdown(text: &str) -> String {
    let text = remove_invisible_chars(&normalise_line_endings(text));
    let blocks = merge_continuations(text.lines().map(classify_line).collect());
    render_blocks(&blocks)
}

fn classify_line(raw: &str) -> Block {
    let line = raw.trim();
    if line.is_empty() {
        return Block::Break;
    }
    if let Some(caps) = RE_BULLET.captures(line) {
        return Block::Bullet(caps[1].to_string());
    }
    if let Some(level) = section_heading_level(line) {
        return Block::Heading(level, line.to_string());
    }
    if let Some(caps) = RE_NUMBERED_ITEM.captures(line) {
        return Block::Numbered(caps[1].to_string(), caps[2].to_string());
    }
    if is_all_caps_title(line) {
        return Block::Heading(2, line.to_string());
    }
    Block::Text(line.to_string())
}

/// `2.1 Scope` → 2, `2.1.4 Scope` → 3.
fn section_heading_level(line: &str) -> Option<usize> {
    if !is_title_like(line) {
        return None;
    }
    let caps = RE_SECTION.captures(line)?;
    let depth = caps[1].matches('.').count();
    Some((depth + 1).min(6))
}

fn is_title_like(line: &str) -> bool {
    line.chars().count() <= MAX_HEADING_CHARS
        && !line.ends_with(['.', ',', ';', ':', '!', '?'])
        && line.chars().any(char::is_alphabetic)
}

fn is_all_caps_title(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    is_title_like(line) && letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase())
}

fn starts_lowercase(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_lowercase)
}

/// Join a continuation onto `prev`, undoing end-of-line hyphenation.
fn join_continuation(prev: &mut String, next: &str) {
    let hyphenated = prev.ends_with('-')
        && prev
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic);
    if hyphenated {
        prev.pop();
    } else {
        prev.push(' ');
    }
    prev.push_str(next);
}

/// Fold lowercase-initial text lines into the preceding text or list item
/// and collapse runs of blank lines.
fn merge_continuations(blocks: Vec<Block>) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block == Block::Break && matches!(merged.last(), None | Some(Block::Break)) {
            continue;
        }
        if let Block::Text(ref next) = block {
            if starts_lowercase(next) {
                match merged.last_mut() {
                    Some(Block::Text(prev))
                    | Some(Block::Bullet(prev))
                    | Some(Block::Numbered(_, prev)) => {
                        join_continuation(prev, next);
                        continue;
                    }
                    _ => {}
                }
            }
        }
        merged.push(block);
    }
    merged
}

fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Block> = None;

    for block in blocks {
        let separator = match (prev, block) {
            (None, _) => "",
            (Some(Block::Break), _) | (_, Block::Break) => "\n",
            (Some(Block::Heading(..)), _) | (_, Block::Heading(..)) => "\n\n",
            (Some(Block::Text(_)), Block::Text(_)) => "\n",
            (
                Some(Block::Bullet(_) | Block::Numbered(..)),
                Block::Bullet(_) | Block::Numbered(..),
            ) => "\n",
            _ => "\n\n",
        };
        out.push_str(separator);

        match block {
            Block::Heading(level, text) => {
                out.push_str(&"#".repeat(*level));
                out.push(' ');
                out.push_str(text);
            }
            Block::Bullet(text) => {
                out.push_str("- ");
                out.push_str(text);
            }
            Block::Numbered(n, text) => {
                out.push_str(n);
                out.push_str(". ");
                out.push_str(text);
            }
            Block::Text(text) => out.push_str(text),
            Block::Break => {}
        }
        prev = Some(block);
    }

    out.trim().to_string()
}

/// Apply the document-level cleanup passes to assembled Markdown.
///
/// Passes (in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse 3+ consecutive blank lines down to 2
/// 4. Ensure heading lines have a blank line before them
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} \S").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if i > 0 && RE_HEADING.is_match(line) && !result.ends_with("\n\n") {
            result.push('\n');
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_become_list_items() {
        let md = page_to_markdown("Items:\r\n• first\r\n● second\r\n* third");
        assert_eq!(md, "Items:\n\n- first\n- second\n- third");
    }

    #[test]
    fn numbered_items() {
        let md = page_to_markdown("1) pay invoice\n2. archive it");
        assert_eq!(md, "1. pay invoice\n2. archive it");
    }

    #[test]
    fn dotted_section_numbers_become_headings() {
        let md = page_to_markdown("2 Scope\nThis applies.\n2.1 Definitions\nA term.");
        assert_eq!(md, "2 Scope\nThis applies.\n\n## 2.1 Definitions\n\nA term.");
        assert_eq!(section_heading_level("2.1.4 Payment terms"), Some(3));
    }

    #[test]
    fn address_lines_are_not_headings() {
        let text = "Ship to:\nJane Doe\n10 Downing Street\nLondon";
        assert_eq!(page_to_markdown(text), text);
        assert_eq!(section_heading_level("10 Downing Street"), None);
    }

    #[test]
    fn numbered_sentence_is_not_a_heading() {
        // Ends with punctuation, so it stays a list item.
        let md = page_to_markdown("1. Deliver the goods.");
        assert_eq!(md, "1. Deliver the goods.");
        assert_eq!(section_heading_level("1. Introduction"), None);
        assert_eq!(section_heading_level("1 Introduction"), None);
    }

    #[test]
    fn all_caps_lines_become_headings() {
        let md = page_to_markdown("INVOICE\nInvoice number 42");
        assert_eq!(md, "## INVOICE\n\nInvoice number 42");
        // Too few letters to be a title.
        assert_eq!(page_to_markdown("VAT"), "VAT");
    }

    #[test]
    fn lowercase_lines_continue_previous() {
        let md = page_to_markdown("The total amount\nis due within 30 days.\nThank you.");
        assert_eq!(md, "The total amount is due within 30 days.\nThank you.");
    }

    #[test]
    fn hyphenation_is_undone() {
        let md = page_to_markdown("This docu-\nment was scanned.");
        assert_eq!(md, "This document was scanned.");
        // A dash that is not a word break stays.
        let md = page_to_markdown("Range 10 -\nmore");
        assert_eq!(md, "Range 10 - more");
    }

    #[test]
    fn continuation_folds_into_list_item() {
        let md = page_to_markdown("- ship the order and\nsend the invoice");
        assert_eq!(md, "- ship the order and send the invoice");
    }

    #[test]
    fn blank_lines_separate_paragraphs() {
        let md = page_to_markdown("Dear customer,\n\n\n\nRegards");
        assert_eq!(md, "Dear customer,\n\nRegards");
    }

    #[test]
    fn empty_page_is_empty() {
        assert_eq!(page_to_markdown(""), "");
        assert_eq!(page_to_markdown(" \r\n \n"), "");
    }

    #[test]
    fn clean_collapses_and_terminates() {
        let s = clean_markdown("a  \r\n\n\n\n\n\nb\u{200B}\n\n\n");
        assert_eq!(s, "a\n\n\nb\n");
    }

    #[test]
    fn clean_spaces_headings() {
        let s = clean_markdown("text\n## Heading\nbody");
        assert_eq!(s, "text\n\n## Heading\nbody\n");
        // Already spaced headings are left alone.
        let s = clean_markdown("text\n\n## Heading");
        assert_eq!(s, "text\n\n## Heading\n");
    }

    #[test]
    fn clean_empty_is_single_newline() {
        assert_eq!(clean_markdown("   \n\n"), "\n");
    }
}
