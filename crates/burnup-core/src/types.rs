//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A numeric estimate was below the minimum for its variant.
    #[error("invalid {field}: {value} (must be at least {minimum})")]
    InvalidEstimate {
        field: &'static str,
        value: f64,
        minimum: f64,
    },

    /// A loosely-typed value could not be read as an estimate.
    #[error("invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// The value does not name a tee-shirt size.
    #[error("unknown tee-shirt size: {value}")]
    UnknownTeeShirtSize { value: String },

    /// The value does not name a lifecycle state.
    #[error("unknown state: {value}")]
    UnknownState { value: String },

    /// The value does not name a work item kind.
    #[error("unknown work item kind: {value}")]
    UnknownKind { value: String },
}

/// Normalized lifecycle stage of a work item.
///
/// Independent of the free-form status strings reported by a tracking tool;
/// adapters map their statuses onto these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum State {
    #[default]
    New,
    Estimated,
    Pending,
    Active,
    Closed,
    Removed,
}

impl State {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Estimated => "Estimated",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Closed => "Closed",
            Self::Removed => "Removed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Estimated" => Ok(Self::Estimated),
            "Pending" => Ok(Self::Pending),
            "Active" => Ok(Self::Active),
            "Closed" => Ok(Self::Closed),
            "Removed" => Ok(Self::Removed),
            _ => Err(ValidationError::UnknownState {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for State {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Tee-shirt estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeeShirtSize {
    Small,
    Medium,
    Large,
    ExtraLarge,
    DoubleExtraLarge,
}

impl TeeShirtSize {
    /// Short name, as most tracking tools display it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "S",
            Self::Medium => "M",
            Self::Large => "L",
            Self::ExtraLarge => "XL",
            Self::DoubleExtraLarge => "XXL",
        }
    }
}

impl fmt::Display for TeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeeShirtSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" | "Small" => Ok(Self::Small),
            "M" | "Medium" => Ok(Self::Medium),
            "L" | "Large" => Ok(Self::Large),
            "XL" | "ExtraLarge" => Ok(Self::ExtraLarge),
            "XXL" | "DoubleExtraLarge" => Ok(Self::DoubleExtraLarge),
            _ => Err(ValidationError::UnknownTeeShirtSize {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for TeeShirtSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TeeShirtSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Discriminant of a work item's estimation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Plain,
    StoryPoints,
    TeeShirt,
    Days,
    Hours,
}

impl WorkItemKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::StoryPoints => "story_points",
            Self::TeeShirt => "tee_shirt",
            Self::Days => "days",
            Self::Hours => "hours",
        }
    }
}

impl fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "story_points" => Ok(Self::StoryPoints),
            "tee_shirt" => Ok(Self::TeeShirt),
            "days" => Ok(Self::Days),
            "hours" => Ok(Self::Hours),
            _ => Err(ValidationError::UnknownKind {
                value: s.to_string(),
            }),
        }
    }
}
