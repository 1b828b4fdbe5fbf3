//! Screenplay line classification and character extraction.
//!
//! Everything here works on the cleaned line list produced by
//! [`crate::ingest::parse_script_from_pdf`]. Classification is heuristic and
//! tuned for conventionally formatted screenplays: character cues are short
//! all-caps lines, scene headings carry well-known prefixes, stage whispers
//! sit alone inside parentheses.

use std::collections::BTreeSet;

/// Prefixes that mark a line as a scene heading or transition rather than
/// dialogue. Matched against the trimmed line, case sensitive.
pub const SCENE_DIRECTION_PREFIXES: [&str; 5] = ["INT.", "EXT.", "FADE", "CUT TO", "DISSOLVE"];

/// True when the line is a scene heading or transition ("INT. KITCHEN",
/// "FADE IN:", "CUT TO:").
pub fn is_scene_direction(line: &str) -> bool {
    SCENE_DIRECTION_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// True when the whole line sits inside parentheses, e.g. "(beat)".
pub fn is_parenthetical(line: &str) -> bool {
    line.starts_with('(') && line.ends_with(')')
}

/// True when the line names the next speaker: entirely uppercase (at least
/// one cased character, none lowercase) and one to three words.
///
/// Short shouted lines like "THE END" slip through; that is the accepted
/// cost of staying format-agnostic about indentation.
pub fn is_character_cue(line: &str) -> bool {
    let words = line.split_whitespace().count();
    is_all_caps(line) && (1..=3).contains(&words)
}

/// Uppercase in the casing sense: no lowercase characters anywhere and at
/// least one uppercase one. Digits and punctuation are uncased, so "JOHN:"
/// and "MARY (V.O.)" qualify while "123" does not.
fn is_all_caps(line: &str) -> bool {
    let mut has_cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// Canonical character name of a cue line: everything before the first `(`,
/// trimmed. "JOHN (O.S.)" and "JOHN" both yield "JOHN".
pub fn cue_name(line: &str) -> String {
    line.split('(').next().unwrap_or(line).trim().to_string()
}

/// Scan the whole script for character cues and return the deduplicated,
/// sorted cast list.
///
/// A cursor walks the lines. Blank lines, scene directions and parentheticals
/// are skipped. On a cue, the canonical name is recorded and the cursor jumps
/// past an immediately following parenthetical (an acting note belongs to the
/// cue, not to the cast). The same input always yields the same output.
pub fn extract_characters(lines: &[String]) -> Vec<String> {
    let mut characters = BTreeSet::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() || is_scene_direction(line) || is_parenthetical(line) {
            i += 1;
            continue;
        }

        if is_character_cue(line) {
            characters.insert(cue_name(line));
            let next_is_note = lines
                .get(i + 1)
                .map(|l| l.trim().starts_with('('))
                .unwrap_or(false);
            i += if next_is_note { 2 } else { 1 };
        } else {
            i += 1;
        }
    }

    characters.into_iter().collect()
}
