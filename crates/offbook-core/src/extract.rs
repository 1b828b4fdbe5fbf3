//! Low-level PDF text extraction.
//!
//! Walks each page's content stream, collects positioned text objects, then
//! reassembles reading order: top to bottom, left to right. Fragments that
//! share a baseline (within [`LINE_Y_TOLERANCE`]) are joined into one line so
//! a character cue split across show-text ops still counts its words.

use crate::error::CoreResult;
use pdf::{content::Operation, file::File, object::Page, primitive::Primitive};
use std::borrow::Cow;
use std::path::Path;

/// Vertical slack (in text-space units) within which two fragments are
/// treated as the same line.
const LINE_Y_TOLERANCE: f32 = 2.0;

/// A positioned chunk of text from a page content stream.
#[derive(Debug, Clone, PartialEq)]
struct TextObject<'src> {
    x: f32,
    y: f32,
    text: Cow<'src, str>,
}

/// Iterator that folds BT..ET operator runs into [`TextObject`]s.
struct TextObjectParser<'src> {
    ops: std::slice::Iter<'src, Operation>,
}

impl<'src> Iterator for TextObjectParser<'src> {
    type Item = TextObject<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut last_coords = None;
        let mut last_text: Option<Cow<'src, str>> = None;

        while let Some(Operation { operator, operands }) = self.ops.next() {
            match (operator.as_str(), operands.as_slice()) {
                ("BT", _) => {
                    // Begin text: clear anything carried over.
                    last_coords = None;
                    last_text = None;
                }
                ("Td" | "TD", [Primitive::Number(x), Primitive::Number(y)]) => {
                    last_coords = Some((*x, *y));
                }
                ("Tm", _) if operands.len() == 6 => {
                    // Text matrix: e and f carry the position.
                    if let (Ok(x), Ok(y)) = (operands[4].as_number(), operands[5].as_number()) {
                        last_coords = Some((x, y));
                    }
                }
                ("Tj", [Primitive::String(text)]) => {
                    last_text = text.as_str().ok();
                }
                ("TJ" | "Tj", [Primitive::Array(parts)]) => {
                    // Glyph runs interleaved with kerning numbers; keep the runs.
                    let mut combined = String::new();
                    for part in parts {
                        if let Primitive::String(text) = part {
                            if let Ok(s) = text.as_str() {
                                combined.push_str(&s);
                            }
                        }
                    }
                    last_text = Some(Cow::from(combined));
                }
                ("ET", _) => {
                    if let (Some((x, y)), Some(text)) = (last_coords.take(), last_text.take()) {
                        return Some(TextObject { x, y, text });
                    }
                }
                _ => continue,
            }
        }

        None
    }
}

/// Flatten one page into newline-separated text in reading order.
fn page_text(page: &Page) -> String {
    let content = match &page.contents {
        Some(c) => c,
        None => return String::new(),
    };

    let mut objects: Vec<TextObject> =
        TextObjectParser { ops: content.operations.iter() }.collect();

    // Top to bottom, then left to right. PDF y grows upward.
    objects.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_y: Option<f32> = None;

    for obj in objects {
        match current_y {
            Some(y) if (y - obj.y).abs() <= LINE_Y_TOLERANCE => {
                if !current.is_empty()
                    && !current.ends_with(char::is_whitespace)
                    && !obj.text.starts_with(char::is_whitespace)
                {
                    current.push(' ');
                }
                current.push_str(&obj.text);
            }
            _ => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current.push_str(&obj.text);
                current_y = Some(obj.y);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Extract the text of every page of the PDF at `path`, one string per page.
pub fn page_texts(path: &Path) -> CoreResult<Vec<String>> {
    let file = File::<Vec<u8>>::open(path)?;
    let mut pages = Vec::new();
    for page in file.pages() {
        let page = page?;
        pages.push(page_text(&page));
    }
    Ok(pages)
}
