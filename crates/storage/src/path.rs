use std::fmt;

use thiserror::Error;

/// Characters the hosted store refuses inside a key. `/` is the path separator.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];
const MAX_KEY_BYTES: usize = 768;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path segment must not be empty")]
    EmptySegment,
    #[error("path segment '{0}' contains a forbidden character")]
    ForbiddenCharacter(String),
    #[error("path segment exceeds {MAX_KEY_BYTES} bytes")]
    TooLong,
    #[error("path '{0}' is nested deeper than collection/key")]
    TooDeep(String),
}

/// Location inside the document store: either a whole collection (`records`) or one
/// document in it (`records/<key>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    key: Option<String>,
}

impl DocumentPath {
    pub fn collection(collection: &str) -> Result<Self, PathError> {
        validate_segment(collection)?;
        Ok(Self {
            collection: collection.to_string(),
            key: None,
        })
    }

    pub fn document(collection: &str, key: &str) -> Result<Self, PathError> {
        validate_segment(collection)?;
        validate_segment(key)?;
        Ok(Self {
            collection: collection.to_string(),
            key: Some(key.to_string()),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim_matches('/');
        let mut parts = trimmed.split('/');
        let collection = parts.next().unwrap_or_default();
        let key = parts.next();
        if parts.next().is_some() {
            return Err(PathError::TooDeep(raw.to_string()));
        }
        match key {
            Some(key) => Self::document(collection, key),
            None => Self::collection(collection),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_document(&self) -> bool {
        self.key.is_some()
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}/{}", self.collection, key),
            None => f.write_str(&self.collection),
        }
    }
}

pub fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if segment.len() > MAX_KEY_BYTES {
        return Err(PathError::TooLong);
    }
    if segment
        .chars()
        .any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control())
    {
        return Err(PathError::ForbiddenCharacter(segment.to_string()));
    }
    Ok(())
}
