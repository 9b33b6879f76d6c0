use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::item::MediaRef;

/// Transient per-owner conversation state. Exactly one flow can be active per
/// owner because the whole state is a single tagged union; the engine keeps
/// one `Session` per owner and clears it back to `Idle` when a flow finishes.
/// Never persisted — in-flight flows are lost on restart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    #[default]
    Idle,
    MapSetup(MapSetupStage),
    Capture(CaptureStage),
    Search,
}

impl Session {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn flow_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MapSetup(_) => "map_setup",
            Self::Capture(_) => "capture",
            Self::Search => "search",
        }
    }
}

/// `idle → awaiting_map_image → awaiting_coordinates → idle`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapSetupStage {
    AwaitingImage,
    AwaitingCoordinates { image: MediaRef },
}

/// `idle → awaiting_photo → awaiting_description → awaiting_location → idle`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStage {
    AwaitingPhoto,
    AwaitingDescription { photo: MediaRef },
    AwaitingLocation { photo: MediaRef, description: String, tags: Vec<String> },
}

/// A step handler rejected the inbound message; the flow stays in the same
/// state and the owner is asked to resend. Recoverable by construction —
/// these are values, never panics.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("malformed coordinates `{0}`: expected two whitespace-separated integers")]
    InvalidCoordinates(String),
    #[error("{flow} flow expects {expected}")]
    UnexpectedInput { flow: &'static str, expected: &'static str },
}

/// Parse map-setup coordinate input in the `X Y` format.
pub fn parse_coordinates(text: &str) -> Result<(i64, i64), FlowTransitionError> {
    let mut tokens = text.split_whitespace();
    let (Some(x), Some(y), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(FlowTransitionError::InvalidCoordinates(text.to_owned()));
    };

    match (x.parse::<i64>(), y.parse::<i64>()) {
        (Ok(x), Ok(y)) => Ok((x, y)),
        _ => Err(FlowTransitionError::InvalidCoordinates(text.to_owned())),
    }
}
