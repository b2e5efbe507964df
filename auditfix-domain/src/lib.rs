//! Domain logic: which phases run, how findings score, which fixes are safe.
//!
//! Everything here is a pure function of its inputs. This crate owns *what* the audit and fix
//! pipelines decide; running tools and touching the tree belongs to `auditfix-core`.

mod catalog;
mod categorize;
mod scoring;
mod select;
mod summary;

pub use catalog::{builtin_phases, phase_ids};
pub use categorize::{BUILTIN_SAFE_RULES, BUILTIN_SAFE_TOOLS, Categorizer};
pub use scoring::{CATEGORY_PENALTIES, GLOBAL_PENALTIES, PenaltyTable, score, score_with};
pub use select::{PhaseFilter, PhaseSelection, glob_match, select_phases};
pub use summary::{dedup_by_fingerprint, summarize};
