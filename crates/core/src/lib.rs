pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod retention;
pub mod search;
pub mod tags;

pub use domain::item::{Item, ItemId, MediaRef, NewItem, OwnerId, UNNAMED_ITEM};
pub use domain::map::FloorMap;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{CaptureStage, FlowTransitionError, MapSetupStage, Session, ROOM_SHORTCUTS};
pub use retention::{RetentionPolicy, DEFAULT_RETENTION_DAYS};
pub use search::MAX_SEARCH_RESULTS;
pub use tags::{Lemmatizer, LemmatizerError, TagExtractor, MAX_TAGS};

pub use chrono;
