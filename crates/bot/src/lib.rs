//! Chat interface and conversation engine for homestash.
//!
//! - **Events** (`events`) - inbound update model and turn outcomes
//! - **Commands** (`commands`) - `/start`, `/add`, `/find`, `/map`, `/cleanup`
//! - **Replies** (`replies`) - fixed Russian reply builders and keyboards
//! - **Engine** (`engine`) - per-owner session state machine over the three
//!   flows plus the retention scan
//! - **Transport** (`transport`) - polling loop with reconnect backoff;
//!   `telegram` provides the Bot API implementation
//! - **Services** (`media`, `nlp`, `speech`) - external collaborator seams
//!
//! # Architecture
//!
//! ```text
//! Chat updates → PollingRunner → ConversationEngine → Repositories
//!                                     ↓
//!                         TagExtractor / MediaStore / Speech
//! ```

pub mod commands;
pub mod engine;
pub mod events;
pub mod media;
pub mod nlp;
pub mod replies;
pub mod speech;
pub mod telegram;
pub mod transport;
