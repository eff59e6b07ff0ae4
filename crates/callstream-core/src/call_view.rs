#![forbid(unsafe_code)]

//! Top-level call view: which screen to show for the current call state.
//!
//! # Design
//!
//! The view is re-evaluated whenever anything it depends on changes. Each
//! evaluation runs [`decide_screen`] over the latest [`CallSnapshot`], the
//! fixed [`CallViewOptions`], the [`CallConfig`] and the view's own
//! [`LeaveState`], then pushes the result into the view's stream in a shared
//! [`StreamCache`]. Identical screens are suppressed by the stream, so
//! subscribers see one event per real transition.
//!
//! # Screen precedence
//!
//! 1. E2EE enabled, room encrypted, no shared key: error.
//! 2. E2EE disabled, room encrypted: error.
//! 3. No LiveKit service URL from the call or the config: error.
//! 4. Call SDK reported an error: error.
//! 5. Call entered: active call.
//! 6. User left: call-ended screen for guests, analytics users outside
//!    embedded mode, and failed leaves; otherwise blank.
//! 7. Preloading: blank.
//! 8. Embedded: loading.
//! 9. Otherwise: lobby.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use callstream_reactive::{OwnerId, StreamCache, ValueStream, value_identity};
use serde::{Deserialize, Serialize};

use crate::config::CallConfig;
use crate::participants::{Participant, participant_count, participating_members};

pub const NO_E2EE_KEY_MESSAGE: &str = "No E2EE key provided: please make sure the URL you're using to join this call has been retrieved using the in-app button.";
pub const E2EE_DISABLED_MESSAGE: &str = "You need to enable E2EE to join.";
pub const NO_LIVEKIT_URL_MESSAGE: &str = "No livekit_service_url defined";

/// Group call lifecycle as reported by the call SDK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCallState {
    #[default]
    LocalCallFeedUninitialized,
    InitializingLocalCallFeed,
    LocalCallFeedInitialized,
    Entered,
    Ended,
}

/// Everything the view reads from the call on one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSnapshot {
    pub state: GroupCallState,
    /// Error surfaced by the call SDK.
    pub error: Option<String>,
    /// The room requires end-to-end encryption.
    pub room_e2ee: bool,
    /// E2EE shared key taken from the join link.
    pub shared_key: Option<String>,
    /// SFU service URL advertised by the call itself.
    pub livekit_service_url: Option<String>,
    pub participants: Vec<Participant>,
}

/// Session flags fixed for the lifetime of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallViewOptions {
    /// Guest account created just for this call.
    pub is_passwordless_user: bool,
    /// Running inside a host application as a widget.
    pub is_embedded: bool,
    /// Loaded ahead of time; waits for the host's join request.
    pub preload: bool,
    pub hide_header: bool,
}

/// The screen the view should show.
///
/// Screens are recomputed from scratch on every pass, so they compare by
/// value (member lists included) rather than by allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum CallScreen {
    Error {
        message: String,
    },
    Active {
        livekit_service_url: String,
        participating_members: Vec<String>,
        e2ee_key: Option<String>,
        hide_header: bool,
    },
    CallEnded {
        leave_error: Option<String>,
        is_passwordless_user: bool,
    },
    /// Nothing rendered.
    Blank,
    Loading,
    Lobby {
        participating_members: Vec<String>,
        hide_header: bool,
    },
}

value_identity!(CallScreen);

impl CallScreen {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::Active { .. } => "active",
            Self::CallEnded { .. } => "call_ended",
            Self::Blank => "blank",
            Self::Loading => "loading",
            Self::Lobby { .. } => "lobby",
        }
    }
}

impl fmt::Display for CallScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { message } => write!(f, "error: {message}"),
            other => f.write_str(other.kind()),
        }
    }
}

/// Whether, and how, the user left the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveState {
    pub left: bool,
    pub leave_error: Option<String>,
}

/// Side effects the caller should perform after [`CallView::leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Devices still in the call when the user left.
    pub participant_count: usize,
    /// Flush the call-ended report immediately instead of batching it; the
    /// embedding host may tear the view down right away.
    pub send_instantly: bool,
    /// Send the user back to the home screen.
    pub navigate_home: bool,
}

/// Decide the screen for one evaluation pass.
#[must_use]
pub fn decide_screen(
    snapshot: &CallSnapshot,
    options: &CallViewOptions,
    config: &CallConfig,
    leave: &LeaveState,
) -> CallScreen {
    let e2ee_enabled = config.e2ee.enabled;
    // An empty key from the join link is no key.
    let shared_key = snapshot.shared_key.as_deref().filter(|key| !key.is_empty());
    if e2ee_enabled && snapshot.room_e2ee && shared_key.is_none() {
        return CallScreen::error(NO_E2EE_KEY_MESSAGE);
    }
    if !e2ee_enabled && snapshot.room_e2ee {
        return CallScreen::error(E2EE_DISABLED_MESSAGE);
    }

    // Config only when the call advertises no URL; an empty one is missing.
    let livekit_service_url = snapshot
        .livekit_service_url
        .as_deref()
        .or_else(|| config.livekit_service_url());
    let Some(livekit_service_url) = livekit_service_url.filter(|url| !url.is_empty()) else {
        return CallScreen::error(NO_LIVEKIT_URL_MESSAGE);
    };

    if let Some(error) = &snapshot.error {
        return CallScreen::error(error.clone());
    }

    if snapshot.state == GroupCallState::Entered {
        return CallScreen::Active {
            livekit_service_url: livekit_service_url.to_string(),
            participating_members: participating_members(&snapshot.participants),
            e2ee_key: shared_key.map(str::to_string),
            hide_header: options.hide_header,
        };
    }

    if leave.left {
        let show_ended = options.is_passwordless_user
            || (config.analytics.enabled && !options.is_embedded)
            || leave.leave_error.is_some();
        return if show_ended {
            CallScreen::CallEnded {
                leave_error: leave.leave_error.clone(),
                is_passwordless_user: options.is_passwordless_user,
            }
        } else {
            // Regular users were sent home; showing the lobby again would
            // reopen capture devices.
            CallScreen::Blank
        };
    }

    if options.preload {
        CallScreen::Blank
    } else if options.is_embedded {
        CallScreen::Loading
    } else {
        CallScreen::Lobby {
            participating_members: participating_members(&snapshot.participants),
            hide_header: options.hide_header,
        }
    }
}

/// One call view instance.
///
/// Owns its [`LeaveState`] and an entry in a shared screen cache, keyed by
/// the view's [`OwnerId`]. Call [`dispose`](Self::dispose) when the view is
/// torn down.
pub struct CallView {
    owner: OwnerId,
    options: CallViewOptions,
    config: CallConfig,
    leave: LeaveState,
    screens: Rc<RefCell<StreamCache<OwnerId, CallScreen>>>,
}

impl fmt::Debug for CallView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallView")
            .field("owner", &self.owner)
            .field("options", &self.options)
            .field("leave", &self.leave)
            .finish_non_exhaustive()
    }
}

impl CallView {
    pub fn new(
        options: CallViewOptions,
        config: CallConfig,
        screens: Rc<RefCell<StreamCache<OwnerId, CallScreen>>>,
    ) -> Self {
        Self {
            owner: OwnerId::next(),
            options,
            config,
            leave: LeaveState::default(),
            screens,
        }
    }

    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[must_use]
    pub fn options(&self) -> &CallViewOptions {
        &self.options
    }

    #[must_use]
    pub fn leave_state(&self) -> &LeaveState {
        &self.leave
    }

    /// Embedded views skip the lobby and join straight away, unless they
    /// are preloading and waiting for the host's join request.
    #[must_use]
    pub fn should_auto_enter(&self) -> bool {
        self.options.is_embedded && !self.options.preload
    }

    /// Run one evaluation pass and return the view's screen stream.
    ///
    /// Call this on every pass, changed or not; the stream drops repeats.
    pub fn evaluate(&self, snapshot: &CallSnapshot) -> ValueStream<CallScreen> {
        let screen = decide_screen(snapshot, &self.options, &self.config, &self.leave);
        // Release the cache borrow before notifying so subscribers may use it.
        let stream = self
            .screens
            .borrow_mut()
            .get_or_create(self.owner, screen.clone());
        if stream.update(screen) {
            tracing::debug!(
                message = "call_view.screen",
                owner = %self.owner,
                screen = stream.with(CallScreen::kind),
                version = stream.version()
            );
        }
        stream
    }

    /// The view's screen stream, if it has been evaluated.
    #[must_use]
    pub fn screens(&self) -> Option<ValueStream<CallScreen>> {
        self.screens.borrow().get(&self.owner)
    }

    /// Record that the user left the call, optionally because of an error.
    pub fn leave(&mut self, snapshot: &CallSnapshot, leave_error: Option<String>) -> LeaveOutcome {
        self.leave = LeaveState {
            left: true,
            leave_error,
        };
        let outcome = LeaveOutcome {
            participant_count: participant_count(&snapshot.participants),
            send_instantly: self.options.is_embedded,
            navigate_home: !self.options.is_passwordless_user
                && !self.options.is_embedded
                && !self.config.analytics.enabled,
        };
        tracing::info!(
            message = "call_view.leave",
            owner = %self.owner,
            participant_count = outcome.participant_count,
            navigate_home = outcome.navigate_home,
            error = self.leave.leave_error.as_deref()
        );
        outcome
    }

    /// Undo a leave so the call can be re-entered. Returns `false` if the
    /// user had not left.
    pub fn reconnect(&mut self) -> bool {
        if !self.leave.left {
            return false;
        }
        self.leave = LeaveState::default();
        tracing::info!(message = "call_view.reconnect", owner = %self.owner);
        true
    }

    #[must_use]
    pub fn has_left(&self) -> bool {
        self.leave.left
    }

    /// Drop the view's stream from the shared cache.
    pub fn dispose(self) -> bool {
        self.screens.borrow_mut().dispose(&self.owner)
    }
}
