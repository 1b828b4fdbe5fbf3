//! # Offbook Core — Script Ingestion and the Scene Turn Engine
//!
//! Screenplay PDF -> cleaned lines -> cast list, plus the pure turn engine
//! that drives a rehearsal one position at a time. No HTTP and no audio here;
//! the gateway wires those on top.

pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod script;
pub mod store;
pub mod turn;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use ingest::parse_script_from_pdf;
pub use script::{cue_name, extract_characters, is_character_cue, is_parenthetical, is_scene_direction};
pub use store::{now_ms, ScriptRow, ScriptStore};
pub use turn::{advance, Turn};
