//! Meeting-start notifications for calbar.
//!
//! - [`Scheduler`] decides which of today's meetings are due for an alert
//! - [`Ledger`] and [`LedgerStore`] persist the ids already alerted, so each
//!   meeting fires at most once across invocations
//! - [`Dispatcher`] shows the alert; [`DesktopDispatcher`] uses the native
//!   notification service
//! - [`Notifier`] runs the whole pass under the ledger lock

pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod notifier;
pub mod scheduler;

pub use dispatch::{DesktopDispatcher, Dispatcher, RecordingDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use ledger::{FileLedgerStore, Ledger, LedgerLock, LedgerStore, MemoryLedgerStore};
pub use notifier::Notifier;
pub use scheduler::{DEFAULT_WINDOW_SECS, DispatchRequest, NOTIFICATION_TITLE, Scheduler};
