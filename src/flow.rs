//! Client-side flows as pure transition tables. The sidecar keeps no UI state;
//! front ends send the current state with an event and get the next one back.

use crate::grid::{self, Day};
use crate::partition::{MAX_SEMESTER, MIN_SEMESTER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{event} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
    pub reason: Option<String>,
}

impl InvalidTransition {
    fn new(state: &'static str, event: &'static str) -> Self {
        Self {
            state,
            event,
            reason: None,
        }
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CellState {
    Empty,
    #[serde(rename_all = "camelCase")]
    Selected {
        day: Day,
        time_slot: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Saving { day: Day, time_slot: String },
    #[serde(rename_all = "camelCase")]
    Committed { day: Day, time_slot: String },
    #[serde(rename_all = "camelCase")]
    Rejected {
        day: Day,
        time_slot: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CellEvent {
    #[serde(rename_all = "camelCase")]
    Select { day: Day, time_slot: String },
    Save,
    Succeeded,
    Failed { error: String },
    Acknowledge,
    Refreshed,
    Cancel,
}

impl CellState {
    pub fn name(&self) -> &'static str {
        match self {
            CellState::Empty => "empty",
            CellState::Selected { .. } => "selected",
            CellState::Saving { .. } => "saving",
            CellState::Committed { .. } => "committed",
            CellState::Rejected { .. } => "rejected",
        }
    }

    pub fn on(self, event: CellEvent) -> Result<CellState, InvalidTransition> {
        let state = self.name();
        match (self, event) {
            (CellState::Saving { .. }, CellEvent::Select { .. }) => {
                Err(InvalidTransition::new(state, "select").because("a save is in flight"))
            }
            (_, CellEvent::Select { day, time_slot }) => {
                if grid::is_break(&time_slot) {
                    return Err(InvalidTransition::new(state, "select")
                        .because(format!("{} is a break", time_slot)));
                }
                if grid::index_of(&time_slot).is_none() {
                    return Err(InvalidTransition::new(state, "select")
                        .because(format!("unknown time slot: {}", time_slot)));
                }
                Ok(CellState::Selected {
                    day,
                    time_slot,
                    error: None,
                })
            }
            (CellState::Selected { day, time_slot, .. }, CellEvent::Save) => {
                Ok(CellState::Saving { day, time_slot })
            }
            (CellState::Selected { .. }, CellEvent::Cancel) => Ok(CellState::Empty),
            (CellState::Saving { day, time_slot }, CellEvent::Succeeded) => {
                Ok(CellState::Committed { day, time_slot })
            }
            (CellState::Saving { day, time_slot }, CellEvent::Failed { error }) => {
                Ok(CellState::Rejected {
                    day,
                    time_slot,
                    error,
                })
            }
            (
                CellState::Rejected {
                    day,
                    time_slot,
                    error,
                },
                CellEvent::Acknowledge,
            ) => Ok(CellState::Selected {
                day,
                time_slot,
                error: Some(error),
            }),
            (CellState::Committed { .. }, CellEvent::Refreshed) => Ok(CellState::Empty),
            (_, event) => Err(InvalidTransition::new(state, event.name())),
        }
    }
}

impl CellEvent {
    fn name(&self) -> &'static str {
        match self {
            CellEvent::Select { .. } => "select",
            CellEvent::Save => "save",
            CellEvent::Succeeded => "succeeded",
            CellEvent::Failed { .. } => "failed",
            CellEvent::Acknowledge => "acknowledge",
            CellEvent::Refreshed => "refreshed",
            CellEvent::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum WizardStep {
    Welcome,
    Branch,
    Semester {
        branch: String,
    },
    Upload {
        branch: String,
        semester: i64,
        section: String,
    },
    Timetable {
        branch: String,
        semester: i64,
        section: String,
    },
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WizardEvent {
    Start,
    OpenAdmin,
    SelectBranch { branch: String },
    SelectSemester { semester: i64, section: String },
    UploadComplete,
    Back,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::Start => "start",
            WizardEvent::OpenAdmin => "openAdmin",
            WizardEvent::SelectBranch { .. } => "selectBranch",
            WizardEvent::SelectSemester { .. } => "selectSemester",
            WizardEvent::UploadComplete => "uploadComplete",
            WizardEvent::Back => "back",
        }
    }
}

impl WizardStep {
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::Welcome => "welcome",
            WizardStep::Branch => "branch",
            WizardStep::Semester { .. } => "semester",
            WizardStep::Upload { .. } => "upload",
            WizardStep::Timetable { .. } => "timetable",
            WizardStep::Admin => "admin",
        }
    }

    pub fn on(self, event: WizardEvent) -> Result<WizardStep, InvalidTransition> {
        let state = self.name();
        match (self, event) {
            (WizardStep::Welcome, WizardEvent::Start) => Ok(WizardStep::Branch),
            (WizardStep::Welcome, WizardEvent::OpenAdmin) => Ok(WizardStep::Admin),
            (WizardStep::Admin, WizardEvent::Back) => Ok(WizardStep::Welcome),
            (WizardStep::Branch, WizardEvent::SelectBranch { branch }) => {
                let branch = branch.trim().to_string();
                if branch.is_empty() {
                    return Err(InvalidTransition::new(state, "selectBranch")
                        .because("branch must not be empty"));
                }
                Ok(WizardStep::Semester { branch })
            }
            (WizardStep::Branch, WizardEvent::Back) => Ok(WizardStep::Welcome),
            (WizardStep::Semester { branch }, WizardEvent::SelectSemester { semester, section }) => {
                if !(MIN_SEMESTER..=MAX_SEMESTER).contains(&semester) {
                    return Err(InvalidTransition::new(state, "selectSemester").because(format!(
                        "semester must be in {}..={}",
                        MIN_SEMESTER, MAX_SEMESTER
                    )));
                }
                let section = section.trim().to_string();
                if section.is_empty() {
                    return Err(InvalidTransition::new(state, "selectSemester")
                        .because("section must not be empty"));
                }
                Ok(WizardStep::Upload {
                    branch,
                    semester,
                    section,
                })
            }
            (WizardStep::Semester { .. }, WizardEvent::Back) => Ok(WizardStep::Branch),
            (
                WizardStep::Upload {
                    branch,
                    semester,
                    section,
                },
                WizardEvent::UploadComplete,
            ) => Ok(WizardStep::Timetable {
                branch,
                semester,
                section,
            }),
            (WizardStep::Upload { branch, .. }, WizardEvent::Back) => {
                Ok(WizardStep::Semester { branch })
            }
            (
                WizardStep::Timetable {
                    branch,
                    semester,
                    section,
                },
                WizardEvent::Back,
            ) => Ok(WizardStep::Upload {
                branch,
                semester,
                section,
            }),
            (_, event) => Err(InvalidTransition::new(state, event.name())),
        }
    }
}
