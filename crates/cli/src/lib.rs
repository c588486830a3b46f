//! Reference host for the autosave scheduler
//!
//! Shared between the `autosave` binary and its integration tests.

pub mod buffers;
pub mod events;
pub mod logging;
pub mod presenter;

pub use buffers::BufferStore;
pub use events::HostEvent;
pub use presenter::TerminalPresenter;
