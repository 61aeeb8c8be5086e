//! Tracker helper subprocess
//!
//! [`TrackerSubprocess`] owns the Python landmark tracker
//! (`scripts/landmark_tracker.py`) that streams packets to the
//! [`MpReceiver`](super::mediapipe::MpReceiver). [`HelperTracker`] pairs a
//! tracker with the helper feeding it and checks the helper once per frame:
//! a helper that exits with a failure status ends the run with a fatal
//! [`TrackingError::HelperFailed`].

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use super::{FrameObservation, Tracker};
use crate::config::TrackerConfig;
use crate::error::{Fushigi2dError, TrackingError};

/// Python interpreter used to run the helper
const PYTHON: &str = "python3";

/// Modules the helper imports
const HELPER_MODULES: [&str; 2] = ["mediapipe", "cv2"];

/// A running helper process. Killed on drop.
#[derive(Debug)]
pub struct TrackerSubprocess {
    child: Option<Child>,
    label: String,
}

impl TrackerSubprocess {
    /// Helper command line (without the interpreter)
    pub fn args(config: &TrackerConfig) -> Vec<String> {
        let mut args = vec![
            config.tracker_script.clone(),
            "--host".to_string(),
            config.listen_address.clone(),
            "--port".to_string(),
            config.port.to_string(),
            "--camera".to_string(),
            config.camera_device.to_string(),
        ];
        if config.mirror {
            args.push("--mirror".to_string());
        }
        args
    }

    /// Launch the helper for `config`. Failing to spawn is fatal.
    pub fn spawn(config: &TrackerConfig) -> Result<Self, Fushigi2dError> {
        let mut command = Command::new(PYTHON);
        command.args(Self::args(config));

        let process = Self::launch(command, &config.tracker_script)?;
        tracing::info!(
            "Tracker helper started (camera: {}, port: {}, mirror: {})",
            config.camera_device,
            config.port,
            config.mirror
        );
        Ok(process)
    }

    fn launch(mut command: Command, label: &str) -> Result<Self, Fushigi2dError> {
        let child = command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TrackingError::HelperFailed(format!("could not launch '{}': {}", label, e))
            })?;

        tracing::debug!("Helper '{}' has pid {:?}", label, child.id());
        Ok(Self {
            child: Some(child),
            label: label.to_string(),
        })
    }

    /// Exit status, once the helper has exited
    fn poll_exit(&mut self) -> Result<Option<ExitStatus>, Fushigi2dError> {
        let Some(child) = &mut self.child else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => {
                self.child = None;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Fails if the helper has exited unsuccessfully. A clean exit is not an
    /// error: the helper sends `end_of_stream` before leaving.
    pub fn check(&mut self) -> Result<(), Fushigi2dError> {
        match self.poll_exit()? {
            Some(status) if status.success() => {
                tracing::info!("Tracker helper '{}' finished", self.label);
                Ok(())
            }
            Some(status) => Err(TrackingError::HelperFailed(format!(
                "'{}' exited with {}",
                self.label, status
            ))
            .into()),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Kill the helper and reap it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping tracker helper (pid: {:?})", child.id());
            if let Err(e) = child.kill().await {
                tracing::debug!("Helper already gone: {}", e);
            }
        }
    }
}

/// A tracker fed by an optional helper process
#[derive(Debug)]
pub struct HelperTracker<T> {
    tracker: T,
    helper: Option<TrackerSubprocess>,
}

impl<T: Tracker> HelperTracker<T> {
    pub fn new(tracker: T, helper: Option<TrackerSubprocess>) -> Self {
        Self { tracker, helper }
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Stop the helper, if one was launched
    pub async fn stop_helper(&mut self) {
        if let Some(helper) = &mut self.helper {
            helper.stop().await;
        }
    }
}

impl<T: Tracker> Tracker for HelperTracker<T> {
    fn process(&mut self) -> Result<Option<FrameObservation>, Fushigi2dError> {
        let frame = self.tracker.process()?;
        if let Some(helper) = &mut self.helper {
            helper.check()?;
        }
        Ok(frame)
    }
}

/// Python modules the helper needs but the interpreter cannot import
pub fn missing_helper_modules() -> Vec<&'static str> {
    HELPER_MODULES
        .into_iter()
        .filter(|module| {
            let imported = std::process::Command::new(PYTHON)
                .args(["-c", &format!("import {}", module)])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            !imported
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::replay::ReplayTracker;
    use std::time::Duration;

    fn shell(script: &str) -> TrackerSubprocess {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        TrackerSubprocess::launch(command, script).unwrap()
    }

    fn frames(n: usize) -> ReplayTracker {
        ReplayTracker::from_frames(vec![FrameObservation::empty(); n])
    }

    #[test]
    fn test_args_from_config() {
        let config = TrackerConfig {
            listen_address: "127.0.0.1".to_string(),
            port: 4000,
            camera_device: 2,
            tracker_script: "track.py".to_string(),
            ..Default::default()
        };
        assert_eq!(
            TrackerSubprocess::args(&config),
            ["track.py", "--host", "127.0.0.1", "--port", "4000", "--camera", "2", "--mirror"]
        );

        let unmirrored = TrackerConfig {
            mirror: false,
            ..config
        };
        assert!(!TrackerSubprocess::args(&unmirrored).contains(&"--mirror".to_string()));
    }

    #[tokio::test]
    async fn test_missing_script_interpreter_is_fatal() {
        let command = Command::new("/definitely/not/a/python");
        let err = TrackerSubprocess::launch(command, "landmark_tracker.py").unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_failed_helper_stops_tracking() {
        let mut tracker = HelperTracker::new(frames(500), Some(shell("exit 3")));

        let mut result = Ok(None);
        for _ in 0..200 {
            result = tracker.process();
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("exited with"), "{}", err);
    }

    #[tokio::test]
    async fn test_clean_helper_exit_keeps_tracking() {
        let mut helper = shell("exit 0");
        let mut exited = None;
        for _ in 0..200 {
            exited = helper.poll_exit().unwrap();
            if exited.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(exited.is_some_and(|status| status.success()));
        assert!(!helper.is_running());

        let mut tracker = HelperTracker::new(frames(2), Some(helper));
        assert!(tracker.process().unwrap().is_some());
        assert!(tracker.process().unwrap().is_some());
        assert!(tracker.process().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_kills_running_helper() {
        let mut tracker = HelperTracker::new(frames(1), Some(shell("sleep 30")));
        assert!(tracker.process().unwrap().is_some());

        tracker.stop_helper().await;
        assert!(tracker.helper.as_ref().is_some_and(|h| !h.is_running()));
    }
}
