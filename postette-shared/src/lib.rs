//! Domain types and pure policies shared by postette front-ends.
//!
//! Nothing in here owns a clock, a task, or a renderer; the lifecycle engine
//! lives in `postette-client` and feeds these types through its scheduler.

pub mod domain;
pub mod error;
pub mod options;
pub mod policy;
pub mod settings;
pub mod time;

pub use domain::{Delay, HistoryEntryDto, Integrate, Level, LevelRegistry, Pause, Record, RecordId};
pub use error::{Diagnostic, ToastError};
pub use options::{Shortcut, ToastOptions, ToastRequest};
pub use settings::{Settings, SettingsPatch};
pub use time::{TimeResolver, TimeTerm, Timings};
