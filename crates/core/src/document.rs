//! Progress document - the per-learner root aggregate.

use crate::module_num::ModuleNum;
use crate::schema::default_sections;
use crate::section::{SectionValue, Sections};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A learner's progress through the five-module curriculum.
///
/// Serialized with the `module1`..`module5` keys at the top level, which
/// is the shape both the local store and the export format use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    /// Display name
    pub student_name: String,

    /// The five modules
    #[serde(flatten)]
    pub modules: Modules,

    /// Percentage of modules completed, recomputed on every save
    pub overall_progress: u8,

    /// Last successful save
    pub last_accessed: Option<Time>,
}

impl ProgressDocument {
    /// Borrow a module.
    pub fn module(&self, n: ModuleNum) -> &Module {
        self.modules.get(n)
    }

    /// Mutably borrow a module.
    pub fn module_mut(&mut self, n: ModuleNum) -> &mut Module {
        self.modules.get_mut(n)
    }

    /// Modules in curriculum order.
    pub fn iter_modules(&self) -> impl Iterator<Item = (ModuleNum, &Module)> {
        ModuleNum::all().map(move |n| (n, self.module(n)))
    }

    /// Number of completed modules.
    pub fn completed_count(&self) -> usize {
        self.iter_modules().filter(|(_, m)| m.completed).count()
    }

    /// Set one section value. Returns `false` when the key is not part of
    /// the module's schema, leaving the document untouched.
    pub fn set_section(&mut self, n: ModuleNum, key: &str, value: SectionValue) -> bool {
        if !crate::schema::is_known_section(n, key) {
            return false;
        }
        self.module_mut(n).sections.insert(key.to_string(), value);
        true
    }
}

impl Default for ProgressDocument {
    fn default() -> Self {
        Self {
            student_name: String::new(),
            modules: Modules::default(),
            overall_progress: 0,
            last_accessed: None,
        }
    }
}

/// One curriculum module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Learner may open this module
    pub unlocked: bool,

    /// Completion latch
    pub completed: bool,

    /// Section values
    pub sections: Sections,
}

impl Module {
    /// A module in its default state.
    pub fn new(n: ModuleNum) -> Self {
        Self {
            unlocked: n == ModuleNum::first(),
            completed: false,
            sections: default_sections(n),
        }
    }

    /// Whether a section is exactly `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.sections.get(key).is_some_and(SectionValue::is_true)
    }
}

/// The fixed set of five modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modules {
    module1: Module,
    module2: Module,
    module3: Module,
    module4: Module,
    module5: Module,
}

impl Modules {
    /// Borrow a module.
    pub fn get(&self, n: ModuleNum) -> &Module {
        match n.get() {
            1 => &self.module1,
            2 => &self.module2,
            3 => &self.module3,
            4 => &self.module4,
            _ => &self.module5,
        }
    }

    /// Mutably borrow a module.
    pub fn get_mut(&mut self, n: ModuleNum) -> &mut Module {
        match n.get() {
            1 => &mut self.module1,
            2 => &mut self.module2,
            3 => &mut self.module3,
            4 => &mut self.module4,
            _ => &mut self.module5,
        }
    }
}

impl Default for Modules {
    fn default() -> Self {
        let [module1, module2, module3, module4, module5] = ModuleNum::ALL.map(Module::new);
        Self {
            module1,
            module2,
            module3,
            module4,
            module5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(n: u8) -> ModuleNum {
        ModuleNum::new(n).unwrap()
    }

    #[test]
    fn test_default_unlock_state() {
        let doc = ProgressDocument::default();
        assert!(doc.module(m(1)).unlocked);
        for n in 2..=5 {
            assert!(!doc.module(m(n)).unlocked, "module {n} should start locked");
        }
        assert_eq!(doc.completed_count(), 0);
        assert_eq!(doc.overall_progress, 0);
        assert!(doc.last_accessed.is_none());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(ProgressDocument::default()).unwrap();
        assert_eq!(json["studentName"], "");
        assert_eq!(json["module1"]["unlocked"], true);
        assert_eq!(json["module4"]["sections"]["tfAnswers"][0], serde_json::Value::Null);
        assert_eq!(json["module5"]["sections"]["finalExamScore"], 0);
        assert_eq!(json["overallProgress"], 0);
        assert!(json["lastAccessed"].is_null());
        assert!(json.get("modules").is_none());
    }

    #[test]
    fn test_set_section_rejects_unknown_key() {
        let mut doc = ProgressDocument::default();
        assert!(!doc.set_section(m(1), "quizPassed", true.into()));
        assert_eq!(doc, ProgressDocument::default());

        assert!(doc.set_section(m(1), "videoWatched", true.into()));
        assert!(doc.module(m(1)).flag("videoWatched"));
    }
}
