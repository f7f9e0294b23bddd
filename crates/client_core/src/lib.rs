//! Client side of the design review flow: the session store the designer and
//! client views read from, and the dispatcher that relays review events to
//! the mail relay.

pub mod config;
pub mod notification;
pub mod session;

pub use config::{load_settings, ClientSettings};
pub use notification::{
    DispatchError, DispatchOutcome, HttpMailRelay, MailRelay, NotificationDispatcher,
    NotificationLog, PendingNotification,
};
pub use session::{Committed, ReviewSession};
