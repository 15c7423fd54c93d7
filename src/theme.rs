//! Themes and daily time slots.
//!
//! Neither affects scoring. A theme only biases copy wording; a slot buckets
//! daily sessions for persistence and question selection.

use std::fmt;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Theme {
    Work,
    Love,
    Future,
    #[serde(alias = "SELF")]
    Life,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Work, Theme::Love, Theme::Future, Theme::Life];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Work => "WORK",
            Theme::Love => "LOVE",
            Theme::Future => "FUTURE",
            Theme::Life => "LIFE",
        }
    }

    /// Parse a theme hint, case-insensitively, including legacy spellings.
    pub fn parse(raw: &str) -> Option<Theme> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WORK" | "JOB" | "CAREER" => Some(Theme::Work),
            "LOVE" | "RELATIONSHIP" | "ROMANCE" => Some(Theme::Love),
            "FUTURE" => Some(Theme::Future),
            "LIFE" | "SELF" => Some(Theme::Life),
            _ => None,
        }
    }

    /// Noun phrase spliced into template advice.
    pub fn focus(self) -> &'static str {
        match self {
            Theme::Work => "your work",
            Theme::Love => "the people close to you",
            Theme::Future => "the road ahead",
            Theme::Life => "yourself",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Noon,
    Night,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Morning, Slot::Noon, Slot::Night];

    /// `[5, 11)` morning, `[11, 17)` noon, everything else night.
    pub fn from_hour(hour: u32) -> Slot {
        match hour {
            5..=10 => Slot::Morning,
            11..=16 => Slot::Noon,
            _ => Slot::Night,
        }
    }

    pub fn at<T: Timelike>(time: &T) -> Slot {
        Slot::from_hour(time.hour())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Morning => "morning",
            Slot::Noon => "noon",
            Slot::Night => "night",
        }
    }

    pub fn parse(raw: &str) -> Option<Slot> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" | "am" => Some(Slot::Morning),
            "noon" | "afternoon" | "day" => Some(Slot::Noon),
            "night" | "evening" | "pm" => Some(Slot::Night),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
