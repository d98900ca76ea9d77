//! Shared model for the internet lines admin service: tiers and line
//! records, configuration, the error taxonomy, notifications and the
//! table change feed.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod notification;
pub mod types;

pub use config::AppConfig;
pub use error::{Failure, LinesError, LinesResult};
pub use event_bus::{ChangeEvent, ChangeFeed, ChangeKind, EventSink, Subscription};
pub use notification::{Notification, Variant};
pub use types::{LineDraft, LinePatch, LineRecord, PaymentStatus, RenewalStatus, StatsRow, Tier, TierConfig, RENEWAL_DUE_WINDOW_DAYS};
