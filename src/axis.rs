//! The four symbolic axes of the soul-layer model.
//!
//! - **E** (Impulse): acting from the spark of the moment
//! - **V** (Vision): reaching toward what could be
//! - **Λ** (Structure): building step by step on what is
//! - **Ǝ** (Observation): the mirrored E, watching before moving
//!
//! The declaration order of [`Axis::ALL`] is also the fixed tie-break priority
//! used when ranking (`E > V > Λ > Ǝ`).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "E")]
    E,
    #[serde(rename = "V")]
    V,
    #[serde(rename = "Λ")]
    Lambda,
    #[serde(rename = "Ǝ")]
    MirrorE,
}

/// Display metadata for one axis. Static, looked up by key only.
#[derive(Debug, Clone, Copy)]
pub struct AxisProfile {
    pub label: &'static str,
    pub color: &'static str,
    pub encouragement: &'static str,
    pub quote: &'static str,
}

static PROFILES: [AxisProfile; 4] = [
    AxisProfile {
        label: "Impulse",
        color: "#FF6B6B",
        encouragement: "Trust the first spark today.",
        quote: "Begin, and the path appears.",
    },
    AxisProfile {
        label: "Vision",
        color: "#FFC857",
        encouragement: "Your horizon is wider today.",
        quote: "What you can imagine is already moving.",
    },
    AxisProfile {
        label: "Structure",
        color: "#4D96FF",
        encouragement: "One solid step is enough.",
        quote: "Stone by stone, the bridge holds.",
    },
    AxisProfile {
        label: "Observation",
        color: "#9B72CF",
        encouragement: "Seeing clearly is acting too.",
        quote: "Still water shows the whole sky.",
    },
];

impl Axis {
    /// All axes in tie-break priority order.
    pub const ALL: [Axis; 4] = [Axis::E, Axis::V, Axis::Lambda, Axis::MirrorE];

    /// Position in [`Axis::ALL`]; lower wins ties.
    pub fn index(self) -> usize {
        match self {
            Axis::E => 0,
            Axis::V => 1,
            Axis::Lambda => 2,
            Axis::MirrorE => 3,
        }
    }

    /// Canonical symbol, also used as the JSON key.
    pub fn symbol(self) -> &'static str {
        match self {
            Axis::E => "E",
            Axis::V => "V",
            Axis::Lambda => "Λ",
            Axis::MirrorE => "Ǝ",
        }
    }

    pub fn profile(self) -> &'static AxisProfile {
        &PROFILES[self.index()]
    }

    pub fn label(self) -> &'static str {
        self.profile().label
    }

    pub fn color(self) -> &'static str {
        self.profile().color
    }

    /// Parse a canonical symbol or one of the legacy aliases.
    ///
    /// Older payloads spell Λ as `L`/`lambda`/`λ` and Ǝ as `∃`/`ǝ`/`R`.
    pub fn parse(raw: &str) -> Option<Axis> {
        let s = raw.trim();
        match s {
            "E" | "e" => Some(Axis::E),
            "V" | "v" => Some(Axis::V),
            "Λ" | "λ" => Some(Axis::Lambda),
            "Ǝ" | "ǝ" | "∃" => Some(Axis::MirrorE),
            _ => match s.to_ascii_uppercase().as_str() {
                "L" | "LAMBDA" => Some(Axis::Lambda),
                "R" | "RE" | "MIRROR_E" | "REVERSE_E" => Some(Axis::MirrorE),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
