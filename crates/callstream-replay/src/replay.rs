#![forbid(unsafe_code)]

//! Script format and replay loop.
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   { "snapshot": { "state": "local_call_feed_initialized" } },
//!   { "snapshot": { "state": "entered", "participants": [{ "member_id": "@a:x" }] } },
//!   { "leave": { "error": null } },
//!   { "reconnect": {} }
//! ]
//! ```
//!
//! Every step is followed by one evaluation pass over the latest snapshot,
//! the same way a UI re-renders after any state change.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use callstream_core::{CallConfig, CallScreen, CallSnapshot, CallView, CallViewOptions};
use callstream_reactive::{StreamCache, Subscription};
use serde::Deserialize;

use crate::error::{ReplayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// New call state from the SDK.
    Snapshot(CallSnapshot),
    /// The user hangs up, optionally because of an error.
    Leave {
        #[serde(default)]
        error: Option<String>,
    },
    /// The user asks to rejoin from the call-ended screen.
    Reconnect {},
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub path: PathBuf,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(path, &raw)
    }

    pub fn from_json_str(path: &Path, json: &str) -> Result<Self> {
        let steps: Vec<Step> = serde_json::from_str(json)?;
        if steps.is_empty() {
            return Err(ReplayError::EmptyScript {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            steps,
        })
    }
}

/// Run `script` through a fresh [`CallView`] and return every screen its
/// stream emitted, starting with the replay of the first screen.
pub fn replay(
    script: &Script,
    options: CallViewOptions,
    config: CallConfig,
) -> Result<Vec<CallScreen>> {
    let screens = Rc::new(RefCell::new(StreamCache::new()));
    let mut view = CallView::new(options, config, Rc::clone(&screens));
    if view.should_auto_enter() {
        tracing::info!(message = "replay.auto_enter", owner = %view.owner());
    }

    let emitted = Rc::new(RefCell::new(Vec::new()));
    let mut subscription: Option<Subscription> = None;
    let mut latest = CallSnapshot::default();

    for (index, step) in script.steps.iter().enumerate() {
        match step {
            Step::Snapshot(snapshot) => latest = snapshot.clone(),
            Step::Leave { error } => {
                let outcome = view.leave(&latest, error.clone());
                tracing::debug!(
                    message = "replay.leave",
                    index,
                    participant_count = outcome.participant_count,
                    send_instantly = outcome.send_instantly,
                    navigate_home = outcome.navigate_home
                );
            }
            Step::Reconnect {} => {
                if !view.reconnect() {
                    tracing::warn!(message = "replay.reconnect_without_leave", index);
                }
            }
        }

        let stream = view.evaluate(&latest);
        if subscription.is_none() {
            let sink = Rc::clone(&emitted);
            subscription = Some(
                stream.subscribe(move |screen: &CallScreen| sink.borrow_mut().push(screen.clone())),
            );
        }
    }

    drop(subscription);
    view.dispose();
    let screens = emitted.borrow().clone();
    tracing::info!(
        message = "replay.done",
        steps = script.steps.len(),
        screens = screens.len()
    );
    Ok(screens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use callstream_core::GroupCallState;
    use callstream_core::config::LivekitConfig;

    fn config() -> CallConfig {
        CallConfig {
            livekit: Some(LivekitConfig {
                livekit_service_url: "https://sfu.example.org".into(),
            }),
            ..CallConfig::default()
        }
    }

    fn script(json: &str) -> Script {
        Script::from_json_str(Path::new("inline.json"), json).unwrap()
    }

    #[test]
    fn parses_all_step_kinds() {
        let script = script(
            r#"[
                {"snapshot": {"state": "entered"}},
                {"leave": {"error": "lost"}},
                {"leave": {}},
                {"reconnect": {}}
            ]"#,
        );
        assert_eq!(
            script.steps,
            vec![
                Step::Snapshot(CallSnapshot {
                    state: GroupCallState::Entered,
                    ..CallSnapshot::default()
                }),
                Step::Leave {
                    error: Some("lost".into())
                },
                Step::Leave { error: None },
                Step::Reconnect {},
            ]
        );
    }

    #[test]
    fn empty_script_is_rejected() {
        let err = Script::from_json_str(Path::new("empty.json"), "[]").unwrap_err();
        assert!(matches!(err, ReplayError::EmptyScript { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = Script::from_json_str(Path::new("bad.json"), r#"[{"dance": {}}]"#).unwrap_err();
        assert!(matches!(err, ReplayError::Json(_)));
    }

    #[test]
    fn replay_emits_transitions_only() {
        let script = script(
            r#"[
                {"snapshot": {"state": "local_call_feed_initialized"}},
                {"snapshot": {"state": "local_call_feed_initialized"}},
                {"snapshot": {"state": "entered"}},
                {"leave": {"error": "ice failed"}},
                {"snapshot": {"state": "local_call_feed_initialized"}},
                {"reconnect": {}}
            ]"#,
        );
        let screens = replay(&script, CallViewOptions::default(), config()).unwrap();
        let kinds: Vec<&str> = screens.iter().map(CallScreen::kind).collect();
        assert_eq!(kinds, vec!["lobby", "active", "call_ended", "lobby"]);
    }

    #[test]
    fn missing_service_url_is_an_error_screen() {
        let script = script(r#"[{"snapshot": {}}]"#);
        let screens = replay(&script, CallViewOptions::default(), CallConfig::default()).unwrap();
        assert_eq!(screens.len(), 1);
        assert_eq!(screens[0].kind(), "error");
    }
}
