pub mod states;

pub use states::{parse_coordinates, CaptureStage, FlowTransitionError, MapSetupStage, Session};

/// Room shortcuts offered as a quick-reply keyboard during item capture.
/// Free text is always accepted alongside these.
pub const ROOM_SHORTCUTS: [&str; 5] = ["Гостиная", "Спальня", "Кухня", "Ванная", "Кабинет"];
