//! Completion engine - module predicates, unlock propagation, and
//! aggregate progress. Pure functions, no I/O.

use crate::document::{Module, ProgressDocument};
use crate::module_num::{ModuleNum, MODULE_COUNT};
use crate::schema::keys;

/// Whether a module's sections satisfy its completion predicate.
pub fn is_module_satisfied(module_num: ModuleNum, module: &Module) -> bool {
    match module_num.get() {
        1 => module.flag(keys::ELEMENT_MIXER_COMPLETED),
        2 => module.flag(keys::QUIZ_PASSED),
        3 => module.flag(keys::QUIZ_PASSED) && module.flag(keys::INTEGRITY_PASSED),
        4 => module.flag(keys::FINAL_CHECK_PASSED),
        _ => module.flag(keys::FINAL_EXAM_PASSED),
    }
}

/// Re-evaluate a module after its sections changed.
///
/// Completion is a one-way latch: a satisfied predicate sets `completed`
/// and unlocks the following module, an unsatisfied one changes nothing.
/// Returns `true` when the module transitioned to completed.
pub fn recompute_completion(doc: &mut ProgressDocument, module_num: ModuleNum) -> bool {
    let module = doc.module(module_num);
    if module.completed || !is_module_satisfied(module_num, module) {
        return false;
    }

    doc.module_mut(module_num).completed = true;
    if let Some(next) = module_num.next() {
        doc.module_mut(next).unlocked = true;
    }
    true
}

/// Percentage of modules completed, rounded to the nearest integer.
pub fn calculate_overall_progress(doc: &ProgressDocument) -> u8 {
    percentage(doc.completed_count(), MODULE_COUNT as usize)
}

/// Share of a module's sections that are filled in (`true` or a positive
/// number), as a rounded percentage. Display only.
pub fn module_fill_ratio(doc: &ProgressDocument, module_num: ModuleNum) -> u8 {
    let sections = &doc.module(module_num).sections;
    let filled = sections.values().filter(|v| v.is_filled()).count();
    percentage(filled, sections.len())
}

fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u8
}
