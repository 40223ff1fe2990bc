//! Closed-loop volume control over relative up/down presses
//!
//! The audio system only accepts volume up and down button presses, each moving the level by an
//! unknown amount (typically 2-3 units), and its status reports may lag behind the actual level.
//! [`VolumeController`] alternates presses and status queries until the reported level is close
//! enough to the target:
//!
//! * far from the target, a burst of presses is sent at once, then reports are polled until two
//!   consecutive ones agree;
//! * close to the target, single presses are sent, each followed by a short delay and a query;
//! * once the loop ends, the level is given time to settle and a single corrective press is
//!   issued if it still is too far off.

use std::{fmt, str::FromStr, time::Duration};

use cec_protocol::{EventKind, UserControlCode};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{client::Client, config::VolumeConfig, transport::CecError, Result};

/// Maximum volume level accepted as a target
pub const MAX_VOLUME: u8 = 100;

/// Validated volume target, 0-100
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct VolumeTarget(u8);

impl VolumeTarget {
    pub fn new(value: i64) -> Result<Self> {
        if (0..=MAX_VOLUME as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CecError::invalid_target(format!(
                "volume {} is outside of [0, {}]",
                value, MAX_VOLUME
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl FromStr for VolumeTarget {
    type Err = CecError;

    /// Only plain integers are accepted: `"40"`, not `"40.5"` or `"40abc"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CecError::invalid_target(format!("invalid volume {:?}", s)))?;
        Self::new(value)
    }
}

impl fmt::Display for VolumeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a volume change ended. Not converging isn't an error: the level simply couldn't be
/// brought within tolerance in the allotted attempts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VolumeOutcome {
    Converged { target: u8, level: u8, attempts: u32 },
    NotConverged { target: u8, level: u8, attempts: u32 },
}

impl VolumeOutcome {
    pub fn level(&self) -> u8 {
        match self {
            VolumeOutcome::Converged { level, .. } | VolumeOutcome::NotConverged { level, .. } => {
                *level
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            VolumeOutcome::Converged { attempts, .. }
            | VolumeOutcome::NotConverged { attempts, .. } => *attempts,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, VolumeOutcome::Converged { .. })
    }
}

impl fmt::Display for VolumeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeOutcome::Converged {
                target,
                level,
                attempts,
            } => write!(
                f,
                "reached {} (target {}) after {} attempt(s)",
                level, target, attempts
            ),
            VolumeOutcome::NotConverged {
                target,
                level,
                attempts,
            } => write!(
                f,
                "stopped at {} (target {}) after {} attempt(s)",
                level, target, attempts
            ),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum ControllerState {
    Idle,
    Querying,
    Evaluating,
    SteppingFar,
    SteppingNear,
    Settling,
    Finalizing,
    Converged,
    NotConverged,
}

/// Number of presses used to cover `distance` in one burst
pub fn burst_presses(distance: u8, divisor: f32) -> u32 {
    (distance as f32 / divisor).ceil().max(1.0) as u32
}

/// A single run of the volume control loop
///
/// Only one controller may run at a time, since audio status reports can't be attributed to a
/// specific query. [`crate::CecBridge`] holds a lock for the duration of [`VolumeController::run`].
pub struct VolumeController<'a> {
    client: &'a Client,
    config: &'a VolumeConfig,
    cancel: CancellationToken,
    state: ControllerState,
}

impl<'a> VolumeController<'a> {
    pub fn new(client: &'a Client, config: &'a VolumeConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn transition(&mut self, next: ControllerState) {
        log::trace!("volume controller: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs `fut` unless the controller gets cancelled first
    async fn cancellable<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CecError::Cancelled),
            res = fut => res,
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.cancellable(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    async fn query(&mut self, timeout: Duration) -> Result<u8> {
        self.transition(ControllerState::Querying);
        let client = self.client;
        let device = self.config.audio_device();
        let status = self
            .cancellable(client.query_audio_status(device, timeout))
            .await?;
        Ok(status.level)
    }

    async fn press(&self, up: bool, count: u32) -> Result<()> {
        let code = if up {
            UserControlCode::VolumeUp
        } else {
            UserControlCode::VolumeDown
        };
        let client = self.client;
        let device = self.config.audio_device();
        self.cancellable(client.press_key_repeated(device, code, count))
            .await
    }

    /// Polls the audio status until two consecutive reports agree, bounded by a number of polls
    /// and an overall deadline
    async fn debounce(&mut self) -> Result<u8> {
        let deadline = Instant::now() + self.config.debounce_deadline();
        let mut previous = None;

        for _ in 0..self.config.debounce_max_polls {
            self.sleep(self.config.debounce_interval()).await?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let level = self
                .query(remaining.min(self.config.status_timeout()))
                .await?;
            if previous == Some(level) {
                return Ok(level);
            }
            previous = Some(level);
        }

        log::debug!("audio status reports didn't settle, last level: {:?}", previous);
        Err(CecError::Timeout {
            expected: EventKind::AudioStatus,
        })
    }

    pub async fn run(mut self, target: VolumeTarget) -> Result<VolumeOutcome> {
        let target = target.value();
        let config = self.config;
        let timeout = config.status_timeout();

        log::debug!("setting volume to {}", target);
        let mut current = self.query(timeout).await?;
        let mut attempts = 0;

        loop {
            self.transition(ControllerState::Evaluating);
            let distance = current.abs_diff(target);
            if distance <= config.loop_tolerance || attempts >= config.max_attempts {
                break;
            }
            attempts += 1;

            let up = current < target;
            if distance > config.far_threshold {
                self.transition(ControllerState::SteppingFar);
                let presses = burst_presses(distance, config.press_divisor);
                log::debug!(
                    "volume {} -> {}: {} {} presses",
                    current,
                    target,
                    presses,
                    if up { "up" } else { "down" }
                );
                self.press(up, presses).await?;
                current = self.debounce().await?;
            } else {
                self.transition(ControllerState::SteppingNear);
                self.press(up, 1).await?;
                self.sleep(config.near_delay()).await?;
                current = self.query(timeout).await?;
            }
        }

        self.transition(ControllerState::Settling);
        self.sleep(config.settle_delay()).await?;
        current = self.query(timeout).await?;

        self.transition(ControllerState::Finalizing);
        if current.abs_diff(target) > config.final_tolerance {
            log::debug!("correcting final volume {} towards {}", current, target);
            self.press(current < target, 1).await?;
            self.sleep(config.near_delay()).await?;
            current = self.query(timeout).await?;
        }

        let outcome = if current.abs_diff(target) <= config.final_tolerance {
            self.transition(ControllerState::Converged);
            VolumeOutcome::Converged {
                target,
                level: current,
                attempts,
            }
        } else {
            self.transition(ControllerState::NotConverged);
            log::warn!(
                "volume didn't converge: level {}, target {} after {} attempts",
                current,
                target,
                attempts
            );
            VolumeOutcome::NotConverged {
                target,
                level: current,
                attempts,
            }
        };

        log::info!("volume set: {:?}", outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target() {
        assert_eq!(VolumeTarget::new(0).unwrap().value(), 0);
        assert_eq!(VolumeTarget::new(100).unwrap().value(), 100);
        assert!(matches!(
            VolumeTarget::new(150),
            Err(CecError::InvalidTarget(_))
        ));
        assert!(matches!(
            VolumeTarget::new(-1),
            Err(CecError::InvalidTarget(_))
        ));

        assert_eq!("40".parse::<VolumeTarget>().unwrap().value(), 40);
        assert_eq!(" 40 ".parse::<VolumeTarget>().unwrap().value(), 40);
        assert!("40.5".parse::<VolumeTarget>().is_err());
        assert!("40abc".parse::<VolumeTarget>().is_err());
        assert!("".parse::<VolumeTarget>().is_err());
        assert!("101".parse::<VolumeTarget>().is_err());
    }

    #[test]
    fn test_burst_presses() {
        assert_eq!(burst_presses(30, 2.5), 12);
        assert_eq!(burst_presses(11, 2.5), 5);
        assert_eq!(burst_presses(50, 2.5), 20);
        assert_eq!(burst_presses(1, 2.5), 1);
    }

    #[test]
    fn test_outcome_json() {
        let outcome = VolumeOutcome::Converged {
            target: 40,
            level: 41,
            attempts: 2,
        };
        assert_eq!(
            serde_json::to_value(outcome).unwrap(),
            serde_json::json!({"result": "converged", "target": 40, "level": 41, "attempts": 2})
        );
    }
}
