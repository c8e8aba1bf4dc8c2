//! TLC message codes and severities.
//!
//! TLC tags every framed message with a numeric code (`EC.java` in the TLC
//! sources) and a severity (`MP.java`). Only the codes the dispatcher acts on
//! are named here.

use serde::{Deserialize, Serialize};

/// Named TLC message codes.
pub struct TlcCode;

impl TlcCode {
    pub const GENERAL: u32 = 1000;

    pub const TLC_BEHAVIOR_UP_TO_THIS_POINT: u32 = 2121;
    pub const TLC_BACK_TO_STATE: u32 = 2122;

    pub const TLC_STARTING: u32 = 2185;
    pub const TLC_FINISHED: u32 = 2186;
    pub const TLC_MODE_MC: u32 = 2187;
    pub const TLC_MODE_SIMU: u32 = 2188;
    pub const TLC_COMPUTING_INIT: u32 = 2189;
    pub const TLC_INIT_GENERATED1: u32 = 2190;
    pub const TLC_INIT_GENERATED2: u32 = 2191;
    pub const TLC_CHECKING_TEMPORAL_PROPS: u32 = 2192;
    pub const TLC_SUCCESS: u32 = 2193;
    pub const TLC_SEARCH_DEPTH: u32 = 2194;
    pub const TLC_CHECKPOINT_START: u32 = 2195;
    pub const TLC_CHECKPOINT_END: u32 = 2196;
    pub const TLC_STATS: u32 = 2199;
    pub const TLC_PROGRESS_STATS: u32 = 2200;
    pub const TLC_COVERAGE_START: u32 = 2201;
    pub const TLC_COVERAGE_END: u32 = 2202;
    pub const TLC_INIT_GENERATED3: u32 = 2207;
    pub const TLC_INIT_GENERATED4: u32 = 2208;
    pub const TLC_STATE_PRINT1: u32 = 2216;
    pub const TLC_STATE_PRINT2: u32 = 2217;
    pub const TLC_STATE_PRINT3: u32 = 2218;
    pub const TLC_SANY_END: u32 = 2219;
    pub const TLC_SANY_START: u32 = 2220;
    pub const TLC_COVERAGE_VALUE: u32 = 2221;
    pub const TLC_VERSION: u32 = 2262;
    pub const TLC_COUNTER_EXAMPLE: u32 = 2264;
    pub const TLC_COMPUTING_INIT_PROGRESS: u32 = 2269;
    pub const TLC_COVERAGE_NEXT: u32 = 2772;
    pub const TLC_COVERAGE_INIT: u32 = 2773;
    pub const TLC_COVERAGE_PROPERTY: u32 = 2774;
    pub const TLC_COVERAGE_VALUE_COST: u32 = 2775;
    pub const TLC_COVERAGE_CONSTRAINT: u32 = 2778;

    pub fn is_init_generated(code: u32) -> bool {
        matches!(
            code,
            Self::TLC_INIT_GENERATED1
                | Self::TLC_INIT_GENERATED2
                | Self::TLC_INIT_GENERATED3
                | Self::TLC_INIT_GENERATED4
        )
    }

    /// Coverage entries that carry an action location and counts.
    pub fn is_coverage_entry(code: u32) -> bool {
        matches!(code, Self::TLC_COVERAGE_INIT | Self::TLC_COVERAGE_NEXT)
    }

    /// Per-expression coverage detail that has no place in the summary.
    pub fn is_coverage_detail(code: u32) -> bool {
        matches!(
            code,
            Self::TLC_COVERAGE_VALUE
                | Self::TLC_COVERAGE_VALUE_COST
                | Self::TLC_COVERAGE_PROPERTY
                | Self::TLC_COVERAGE_CONSTRAINT
        )
    }
}

/// Message severity, the number after the colon in a start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    #[default]
    Info,
    Error,
    TlcBug,
    Warning,
    State,
}

impl Severity {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Info),
            1 => Some(Self::Error),
            2 => Some(Self::TlcBug),
            3 => Some(Self::Warning),
            4 => Some(Self::State),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error | Self::TlcBug)
    }
}
