#![forbid(unsafe_code)]

//! Call-view state for callstream.
//!
//! Everything here is a pure function of the current call snapshot plus a
//! little session state (has the user left, and why). The chosen
//! [`CallScreen`] is published through a
//! [`ValueStream`](callstream_reactive::ValueStream) so consumers only hear
//! about actual screen changes, however often the view is re-evaluated.

pub mod call_view;
pub mod config;
pub mod error;
pub mod participants;

pub use call_view::{
    CallScreen, CallSnapshot, CallView, CallViewOptions, GroupCallState, LeaveOutcome, LeaveState,
    decide_screen,
};
pub use config::CallConfig;
pub use error::{CallError, Result};
pub use participants::{
    MAX_DEVICES_PER_MEMBER, Participant, participant_count, participating_members,
};
