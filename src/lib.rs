//! Two-party relationship negotiation carried over chat text.
//!
//! Each side keeps one [`PartnerRecord`] per whitelisted counterpart, with two
//! independent directional statuses: the role you hold toward them and the
//! role they hold toward you. Partners propose, accept, decline and remove
//! roles by sending short tagged chat lines (see [`message`]); a received
//! line is decoded, the sender resolved through the [`PartnerDirectory`], and
//! the matching transition applied by the [`RelationBook`].
//!
//! # Layout
//!
//! - [`lean`], [`record`], [`guard`]: the role model, per-partner record and
//!   the tier-adjustment rule for commitment timestamps
//! - [`directory`], [`state_machine`]: name resolution and transitions
//! - [`message`], [`dispatcher`], [`events`]: wire codec, dispatch and
//!   notification fan-out
//! - [`gateway`]: the serialized task owning the book, plus lock timers from
//!   the `timers` crate
//! - [`settings`], [`config`]: persisted hardcore settings and protocol config
//!
//! # Example
//!
//! ```no_run
//! use rolebond::{EventBus, ProtocolConfig, RelationBook, RelationGateway, Whitelist};
//! use rolebond::settings::HardcoreSettings;
//! use timers::TimerRegistry;
//!
//! # async fn run() -> Result<(), rolebond::RelationError> {
//! let book = RelationBook::new(Whitelist::from_names(["Kaede Ito"])?);
//! let gateway = RelationGateway::spawn(
//!     "Mira Vale",
//!     book,
//!     TimerRegistry::new(),
//!     EventBus::new(),
//!     &ProtocolConfig::default(),
//!     HardcoreSettings::default(),
//! );
//! gateway.submit("[rolebond] 11|Kaede Ito|Owner").await?;
//! let reply = gateway.accept_pending("Kaede Ito").await?;
//! println!("send: {reply}");
//! gateway.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod guard;
pub mod lean;
pub mod message;
pub mod record;
pub mod settings;
pub mod state_machine;

pub use config::{OpcodeRange, OpcodeTable, ProtocolConfig};
pub use directory::{PartnerDirectory, PartnerIndex, Whitelist};
pub use dispatcher::{Dispatcher, Transition};
pub use error::{ConfigError, DecodeError, RelationError, SettingsError};
pub use events::{EventBus, NotificationLog, RelationEvent, RelationEventHandler};
pub use gateway::RelationGateway;
pub use guard::prevent_timer_restart;
pub use lean::{LeanCategory, RoleLean};
pub use message::{DecodedMessage, MessageCodec, TransitionKind};
pub use record::{LayerLock, PartnerRecord, LOCK_LAYERS};
pub use state_machine::{AcceptOutcome, RelationBook};
