use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use mmwcore::{DecodedFrame, FrameStatus, SensorError, SensorInterface};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FrameLimit,
    Idle,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub frames: usize,
    pub points: usize,
    pub ticks: usize,
    pub last_frame_number: Option<u32>,
    pub stop_reason: StopReason,
}

/// Fixed-cadence scheduler that drives one sensor interface.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Ticks `process_frame` until a stop condition, handing every decoded
    /// frame to `on_frame`. Losing the device ends the run cleanly; overflow
    /// and decode failures are returned as errors.
    pub fn run<F>(&self, sensor: &mut SensorInterface, mut on_frame: F) -> anyhow::Result<WorkflowResult>
    where
        F: FnMut(&DecodedFrame),
    {
        let tick = Duration::from_millis(self.config.tick_interval_ms);
        let mut result = WorkflowResult {
            frames: 0,
            points: 0,
            ticks: 0,
            last_frame_number: None,
            stop_reason: StopReason::Idle,
        };
        let mut idle = 0usize;

        loop {
            if self.config.max_frames.is_some_and(|max| result.frames >= max) {
                result.stop_reason = StopReason::FrameLimit;
                break;
            }
            result.ticks += 1;

            match sensor.process_frame() {
                Ok(FrameStatus::Complete(frame)) => {
                    idle = 0;
                    result.frames += 1;
                    result.points += frame.detected_points.as_ref().map_or(0, Vec::len);
                    result.last_frame_number = Some(frame.frame_number());
                    on_frame(&frame);
                }
                Ok(FrameStatus::Incomplete) => {
                    idle += 1;
                    if self.config.max_idle_ticks.is_some_and(|max| idle >= max) {
                        result.stop_reason = StopReason::Idle;
                        break;
                    }
                }
                Err(err @ (SensorError::DataPortNotOpen | SensorError::Io(_))) => {
                    log::warn!("sensor link lost ({}), stopping; reconnect to resume", err);
                    if let Err(close_err) = sensor.close_connection() {
                        log::debug!("closing lost sensor: {}", close_err);
                    }
                    result.stop_reason = StopReason::Disconnected;
                    break;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("acquisition stopped after {} frames", result.frames)
                    });
                }
            }

            if !tick.is_zero() {
                thread::sleep(tick);
            }
        }

        Ok(result)
    }
}
