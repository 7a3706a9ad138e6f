//! Input state behind the "create cabinet" action.
//!
//! A front end keeps one [`FormState`], feeds every user action through
//! [`FormState::apply`] and re-renders from the returned snapshot.

use std::path::PathBuf;

use crate::error::Result;
use crate::request::{ArchiveRequest, normalize_archive_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    SourceChosen(String),
    TargetChosen(String),
    NameEdited(String),
    IncludeSubfolders(bool),
    Started,
    Finished,
}

/// Immutable snapshot of the form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub source_path: String,
    pub target_path: String,
    pub archive_name: String,
    pub include_subfolders: bool,
    pub busy: bool,
}

impl FormState {
    /// Returns the state after `event`; `self` is left untouched.
    pub fn apply(&self, event: FormEvent) -> FormState {
        let mut next = self.clone();
        match event {
            FormEvent::SourceChosen(path) => next.source_path = path,
            FormEvent::TargetChosen(path) => next.target_path = path,
            FormEvent::NameEdited(name) => {
                next.archive_name = if name.is_empty() {
                    name
                } else {
                    normalize_archive_name(&name)
                };
            }
            FormEvent::IncludeSubfolders(on) => next.include_subfolders = on,
            FormEvent::Started => next.busy = true,
            FormEvent::Finished => next.busy = false,
        }
        next
    }

    /// True iff all three inputs are filled in and nothing is running.
    pub fn can_start(&self) -> bool {
        !self.source_path.is_empty()
            && !self.target_path.is_empty()
            && !self.archive_name.is_empty()
            && !self.busy
    }

    /// Where the archive would be written, once target and name are known.
    pub fn destination_path(&self) -> Option<PathBuf> {
        if self.target_path.is_empty() || self.archive_name.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.target_path).join(&self.archive_name))
    }

    pub fn to_request(&self) -> Result<ArchiveRequest> {
        ArchiveRequest::new(
            &self.source_path,
            &self.target_path,
            &self.archive_name,
            self.include_subfolders,
        )
    }
}
