use serde::{Deserialize, Serialize};

use crate::section::Section;

/// Input handed to one section worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInput {
    /// Position of the section in the plan.
    pub index: usize,
    pub section: Section,
}

/// Route each planned section to its own worker, in plan order.
///
/// Pure: launching the workers is the caller's job.
pub fn dispatch(sections: &[Section]) -> Vec<WorkerInput> {
    sections
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, section)| WorkerInput { index, section })
        .collect()
}
