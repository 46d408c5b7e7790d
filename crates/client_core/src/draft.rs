use std::collections::BTreeSet;

use shared::domain::{Student, StudentFields, Subject};
use thiserror::Error;

/// Form contents as typed by the user. Numbers stay text until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub age: String,
    pub roll_no: String,
    pub subjects: Vec<Subject>,
}

impl Draft {
    /// Returns `false` when the subject was already selected.
    pub fn add_subject(&mut self, subject: Subject) -> bool {
        if self.subjects.contains(&subject) {
            return false;
        }
        self.subjects.push(subject);
        true
    }

    pub fn remove_subject(&mut self, subject: Subject) {
        self.subjects.retain(|s| *s != subject);
    }
}

impl From<&Student> for Draft {
    fn from(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            age: student.age.to_string(),
            roll_no: student.roll_no.to_string(),
            subjects: student.subjects.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields")]
    MissingRequiredFields,
    #[error("invalid age")]
    InvalidAge,
    #[error("invalid roll number")]
    InvalidRollNumber,
    #[error("no subject selected")]
    NoSubjectSelected,
}

/// Checks run in order and stop at the first failure.
pub fn validate_draft(draft: &Draft) -> Result<StudentFields, ValidationError> {
    let name = draft.name.trim();
    let age = draft.age.trim();
    let roll_no = draft.roll_no.trim();
    if name.is_empty() || age.is_empty() || roll_no.is_empty() {
        return Err(ValidationError::MissingRequiredFields);
    }
    let age = positive(age).ok_or(ValidationError::InvalidAge)?;
    let roll_no = positive(roll_no).ok_or(ValidationError::InvalidRollNumber)?;
    if draft.subjects.is_empty() {
        return Err(ValidationError::NoSubjectSelected);
    }

    Ok(StudentFields {
        name: name.to_string(),
        age,
        roll_no,
        subjects: draft.subjects.iter().copied().collect::<BTreeSet<_>>(),
    })
}

fn positive(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
