//! Per-module section schema.
//!
//! Each module has a fixed set of section keys with a default value. The
//! defaults double as the migration base: persisted documents are merged
//! onto them, so keys added here appear in older saved progress.

use crate::module_num::ModuleNum;
use crate::section::{SectionValue, Sections};

/// Number of items in the module 4 card and true/false checklists.
pub const CHECKLIST_LEN: usize = 5;

/// Section keys referenced by completion predicates and the certificate.
pub mod keys {
    /// Module 1 gate
    pub const ELEMENT_MIXER_COMPLETED: &str = "elementMixerCompleted";
    /// Module 2 and 3 quiz gate
    pub const QUIZ_PASSED: &str = "quizPassed";
    /// Module 3 second gate
    pub const INTEGRITY_PASSED: &str = "integrityPassed";
    /// Module 4 gate
    pub const FINAL_CHECK_PASSED: &str = "finalCheckPassed";
    /// Module 5 gate
    pub const FINAL_EXAM_PASSED: &str = "finalExamPassed";
    /// Module 5 certificate flag
    pub const CERTIFIED: &str = "certified";
    /// Module 5 certificate timestamp
    pub const CERTIFICATION_DATE: &str = "certificationDate";
}

/// Default section values for a module.
pub fn default_sections(module: ModuleNum) -> Sections {
    let entries: Vec<(&str, SectionValue)> = match module.get() {
        1 => vec![
            ("videoWatched", false.into()),
            ("section1Read", false.into()),
            ("section2Read", false.into()),
            (keys::ELEMENT_MIXER_COMPLETED, false.into()),
        ],
        2 => vec![
            ("videoWatched", false.into()),
            ("soundDetectivePassed", false.into()),
            ("networkMapViewed", false.into()),
            ("rhythmGameCompleted", false.into()),
            ("quizScore", SectionValue::score(0)),
            (keys::QUIZ_PASSED, false.into()),
        ],
        3 => vec![
            ("videoWatched", false.into()),
            ("scannerInteracted", false.into()),
            ("labyrinthEscaped", false.into()),
            (keys::INTEGRITY_PASSED, false.into()),
            ("quizScore", SectionValue::score(0)),
            (keys::QUIZ_PASSED, false.into()),
        ],
        4 => vec![
            ("cardsCompleted", vec![Some(false); CHECKLIST_LEN].into()),
            ("allCardsCompleted", false.into()),
            ("tfAnswers", vec![None; CHECKLIST_LEN].into()),
            (keys::FINAL_CHECK_PASSED, false.into()),
        ],
        _ => vec![
            ("videoWatched", false.into()),
            ("sdrCompleted", false.into()),
            ("sdrTrapCompleted", false.into()),
            ("hazardHuntCompleted", false.into()),
            ("finalExamScore", SectionValue::score(0)),
            (keys::FINAL_EXAM_PASSED, false.into()),
            (keys::CERTIFIED, false.into()),
            (keys::CERTIFICATION_DATE, SectionValue::Empty),
        ],
    };

    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Whether `key` is a known section of `module`.
pub fn is_known_section(module: ModuleNum, key: &str) -> bool {
    default_sections(module).contains_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(n: u8) -> ModuleNum {
        ModuleNum::new(n).unwrap()
    }

    #[test]
    fn test_section_counts() {
        assert_eq!(default_sections(m(1)).len(), 4);
        assert_eq!(default_sections(m(2)).len(), 6);
        assert_eq!(default_sections(m(3)).len(), 6);
        assert_eq!(default_sections(m(4)).len(), 4);
        assert_eq!(default_sections(m(5)).len(), 8);
    }

    #[test]
    fn test_known_sections() {
        assert!(is_known_section(m(1), "elementMixerCompleted"));
        assert!(!is_known_section(m(1), "quizPassed"));
        assert!(is_known_section(m(3), "integrityPassed"));
        assert!(is_known_section(m(5), "certificationDate"));
    }

    #[test]
    fn test_checklists_default() {
        let sections = default_sections(m(4));
        assert_eq!(
            sections["tfAnswers"],
            SectionValue::Checklist(vec![None; CHECKLIST_LEN])
        );
    }
}
