use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned identifier of a student record. Opaque to everything above the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

macro_rules! subjects {
    ($($variant:ident => $label:literal),+ $(,)?) => {
        /// Fixed vocabulary a student can be enrolled in.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Subject {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl Subject {
            pub const ALL: &'static [Subject] = &[$(Subject::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Subject::$variant => $label,)+
                }
            }
        }
    };
}

subjects! {
    Mathematics => "Mathematics",
    Science => "Science",
    English => "English",
    History => "History",
    ComputerScience => "Computer Science",
    Physics => "Physics",
    Chemistry => "Chemistry",
    Biology => "Biology",
    Geography => "Geography",
    Economics => "Economics",
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown subject '{0}'")]
pub struct UnknownSubject(pub String);

impl FromStr for Subject {
    type Err = UnknownSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Subject::ALL
            .iter()
            .copied()
            .find(|subject| subject.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSubject(wanted.to_string()))
    }
}

/// Field values of a record without its identifier. This is the stored document shape
/// and the body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFields {
    pub name: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub age: u32,
    #[serde(deserialize_with = "lenient::integer")]
    pub roll_no: u32,
    pub subjects: BTreeSet<Subject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: RecordId,
    pub name: String,
    #[serde(deserialize_with = "lenient::integer")]
    pub age: u32,
    #[serde(deserialize_with = "lenient::integer")]
    pub roll_no: u32,
    pub subjects: BTreeSet<Subject>,
}

impl Student {
    pub fn from_fields(id: RecordId, fields: StudentFields) -> Self {
        Self {
            id,
            name: fields.name,
            age: fields.age,
            roll_no: fields.roll_no,
            subjects: fields.subjects,
        }
    }

    pub fn fields(&self) -> StudentFields {
        StudentFields {
            name: self.name.clone(),
            age: self.age,
            roll_no: self.roll_no,
            subjects: self.subjects.clone(),
        }
    }

    /// Overwrites the fields present in `patch`; absent fields keep their value.
    pub fn apply(&mut self, patch: &StudentPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(roll_no) = patch.roll_no {
            self.roll_no = roll_no;
        }
        if let Some(subjects) = &patch.subjects {
            self.subjects = subjects.clone();
        }
    }
}

/// Partial update body. Only the fields that are present are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_integer"
    )]
    pub age: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_integer"
    )]
    pub roll_no: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<BTreeSet<Subject>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.roll_no.is_none() && self.subjects.is_none()
    }
}

impl From<StudentFields> for StudentPatch {
    fn from(fields: StudentFields) -> Self {
        Self {
            name: Some(fields.name),
            age: Some(fields.age),
            roll_no: Some(fields.roll_no),
            subjects: Some(fields.subjects),
        }
    }
}

/// Older documents carry `age` and `rollNo` as the raw form strings, so both JSON numbers
/// and decimal strings are accepted on read. Writes always emit numbers.
mod lenient {
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u64),
        Text(String),
    }

    impl NumberOrText {
        fn into_u32<E: Error>(self) -> Result<u32, E> {
            match self {
                NumberOrText::Number(n) => u32::try_from(n)
                    .map_err(|_| E::custom(format!("integer {n} is out of range"))),
                NumberOrText::Text(text) => text
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| E::custom(format!("'{text}' is not a non-negative integer"))),
            }
        }
    }

    pub(super) fn integer<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        NumberOrText::deserialize(deserializer)?.into_u32()
    }

    pub(super) fn optional_integer<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<NumberOrText>::deserialize(deserializer)?
            .map(NumberOrText::into_u32)
            .transpose()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
