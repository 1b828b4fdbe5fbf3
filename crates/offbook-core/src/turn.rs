//! The scene turn engine.
//!
//! One call classifies exactly one script position. The caller holds the
//! position between calls; nothing here keeps session state, so the same
//! (lines, position, character) always yields the same [`Turn`]. Side
//! effects (speech synthesis, audio files) belong to the gateway layer.

use crate::script::{is_character_cue, is_parenthetical, is_scene_direction};

/// Outcome of advancing the scene by one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// The script (or its dialogue) is exhausted.
    SceneComplete,

    /// The line at `position` was skippable; call again with `next_position`.
    Continue { next_position: usize },

    /// The active character speaks next. `prompt` is their line, shown as a
    /// prompt and never synthesized.
    UserTurn { prompt: String, next_position: usize },

    /// Another character speaks next; `text` is the line to synthesize.
    NpcLine {
        character: String,
        text: String,
        next_position: usize,
    },
}

/// Advance the scene by one turn.
///
/// A position at or past the end completes the scene. Blank lines, scene
/// directions and parentheticals are skipped one at a time. A character cue
/// looks ahead past blank lines and acting notes to the spoken line; if the
/// script ends before one is found, the scene completes. The cue is compared
/// to `active_character` case-insensitively but otherwise verbatim, so an
/// annotated cue like "JOHN (O.S.)" does not match an active "JOHN".
pub fn advance(lines: &[String], position: usize, active_character: &str) -> Turn {
    if position >= lines.len() {
        return Turn::SceneComplete;
    }

    let line = lines[position].trim();

    if line.is_empty() || is_scene_direction(line) || is_parenthetical(line) {
        return Turn::Continue { next_position: position + 1 };
    }

    if is_character_cue(line) {
        let current_char = line.to_string();

        let mut lookahead = position + 1;
        while lookahead < lines.len() {
            let candidate = lines[lookahead].trim();
            if candidate.is_empty() || is_parenthetical(candidate) {
                lookahead += 1;
            } else {
                break;
            }
        }
        if lookahead >= lines.len() {
            return Turn::SceneComplete;
        }

        let text = lines[lookahead].trim().to_string();
        let next_position = lookahead + 1;

        if current_char.to_uppercase() == active_character.to_uppercase() {
            return Turn::UserTurn { prompt: text, next_position };
        }
        return Turn::NpcLine { character: current_char, text, next_position };
    }

    Turn::Continue { next_position: position + 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_scene() -> Vec<String> {
        ["INT. ROOM", "JOHN", "Hello there.", "MARY", "Hi John."]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_past_the_end_is_scene_complete_for_any_character() {
        let lines = demo_scene();
        assert_eq!(advance(&lines, lines.len(), "JOHN"), Turn::SceneComplete);
        assert_eq!(advance(&lines, lines.len() + 7, "NOBODY"), Turn::SceneComplete);
    }

    #[test]
    fn test_directions_skip_one_line_per_call() {
        let lines = demo_scene();
        assert_eq!(advance(&lines, 0, "JOHN"), Turn::Continue { next_position: 1 });
    }

    #[test]
    fn test_own_cue_becomes_a_user_prompt() {
        let lines = demo_scene();
        assert_eq!(
            advance(&lines, 1, "JOHN"),
            Turn::UserTurn { prompt: "Hello there.".to_string(), next_position: 3 }
        );
    }

    #[test]
    fn test_other_cue_becomes_an_npc_line() {
        let lines = demo_scene();
        assert_eq!(
            advance(&lines, 1, "MARY"),
            Turn::NpcLine {
                character: "JOHN".to_string(),
                text: "Hello there.".to_string(),
                next_position: 3,
            }
        );
    }

    #[test]
    fn test_active_character_match_ignores_case() {
        let lines = demo_scene();
        assert_eq!(
            advance(&lines, 1, "john"),
            Turn::UserTurn { prompt: "Hello there.".to_string(), next_position: 3 }
        );
    }

    #[test]
    fn test_annotated_cue_does_not_match_plain_active_name() {
        let lines: Vec<String> = ["JOHN (O.S.)", "Door's open."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            advance(&lines, 0, "JOHN"),
            Turn::NpcLine {
                character: "JOHN (O.S.)".to_string(),
                text: "Door's open.".to_string(),
                next_position: 2,
            }
        );
    }

    #[test]
    fn test_lookahead_skips_acting_notes_to_the_dialogue() {
        let lines: Vec<String> = ["JOHN", "(whispering)", "I'm here."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            advance(&lines, 0, "MARY"),
            Turn::NpcLine {
                character: "JOHN".to_string(),
                text: "I'm here.".to_string(),
                next_position: 3,
            }
        );
    }

    #[test]
    fn test_trailing_cue_with_no_dialogue_completes_the_scene() {
        let lines: Vec<String> = ["JOHN", "(beat)"].iter().map(|s| s.to_string()).collect();
        assert_eq!(advance(&lines, 0, "JOHN"), Turn::SceneComplete);
    }

    #[test]
    fn test_plain_narration_continues() {
        let lines = vec!["He waits in the dark.".to_string()];
        assert_eq!(advance(&lines, 0, "JOHN"), Turn::Continue { next_position: 1 });
    }

    #[test]
    fn test_full_walk_of_a_two_hander() {
        // Drive the demo scene to completion as MARY, collecting each turn.
        let lines = demo_scene();
        let mut position = 0;
        let mut observed = Vec::new();
        loop {
            match advance(&lines, position, "MARY") {
                Turn::SceneComplete => break,
                Turn::Continue { next_position } => position = next_position,
                Turn::UserTurn { prompt, next_position } => {
                    observed.push(format!("user:{}", prompt));
                    position = next_position;
                }
                Turn::NpcLine { character, text, next_position } => {
                    observed.push(format!("npc:{}:{}", character, text));
                    position = next_position;
                }
            }
        }
        assert_eq!(observed, vec!["npc:JOHN:Hello there.", "user:Hi John."]);
    }
}
