//! Interactive find-in-files terminal UI.
//!
//! [`session`] holds the state machine, [`worker`] runs searches and preview
//! loads off the UI thread, and [`run`] drives both from a crossterm event
//! loop, rendering with ratatui.

mod app;
mod input;
pub mod session;
mod ui;
pub mod worker;

pub use app::{Options, run};
pub use session::{
    DEBOUNCE, Direction, Dispatch, Field, PreviewRequest, RESULT_WINDOW, ResultSet, Session,
    SessionConfig, Termination,
};
pub use worker::Workers;
