use crate::math::stats::StatsHelper;
use crate::prelude::{
    ProcessingStage, SensorError, SensorResult, StageConfig, StageInput, StageMetadata,
    StageOutput,
};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, ArrayView2};

/// One step of the exponential background estimator.
///
/// With no prior `clutter` the frame seeds the estimate, so the first cleaned
/// frame is all zeros. Returns `(clean_frame, new_clutter)`.
pub fn remove_clutter(
    frame: ArrayView2<f32>,
    clutter: Option<ArrayView2<f32>>,
    ratio: f32,
) -> (Array2<f32>, Array2<f32>) {
    let clutter = match clutter {
        Some(previous) => &previous * ratio + &frame * (1.0 - ratio),
        None => frame.to_owned(),
    };
    let clean = &frame - &clutter;
    (clean, clutter)
}

/// Background-subtraction filter for a single heatmap stream.
///
/// `ratio` is the signal/clutter ratio: the weight kept on history, so a
/// higher ratio adapts more slowly. Changing it discards the estimate.
pub struct ClutterRemovalFilter {
    ratio: f32,
    clutter: Option<Array2<f32>>,
    logger: LogManager,
}

impl ClutterRemovalFilter {
    pub fn new(ratio: f32) -> SensorResult<Self> {
        check_ratio(ratio)?;
        Ok(Self {
            ratio,
            clutter: None,
            logger: LogManager::new("clutter"),
        })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn clutter(&self) -> Option<&Array2<f32>> {
        self.clutter.as_ref()
    }

    /// Installs a new ratio and drops the current estimate so the next
    /// frame reseeds it.
    pub fn set_ratio(&mut self, ratio: f32) -> SensorResult<()> {
        check_ratio(ratio)?;
        self.ratio = ratio;
        self.clutter = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.clutter = None;
    }

    /// Filters one frame, threading the clutter estimate to the next call.
    pub fn process(&mut self, frame: ArrayView2<f32>) -> Array2<f32> {
        self.process_tracked(frame).0
    }

    fn process_tracked(&mut self, frame: ArrayView2<f32>) -> (Array2<f32>, bool) {
        if let Some(previous) = self.clutter.as_ref() {
            if previous.dim() != frame.dim() {
                self.logger.warn(&format!(
                    "heatmap shape changed from {:?} to {:?}, reseeding clutter",
                    previous.dim(),
                    frame.dim()
                ));
                self.clutter = None;
            }
        }
        let reseeded = self.clutter.is_none();
        let (clean, clutter) = remove_clutter(
            frame,
            self.clutter.as_ref().map(|c| c.view()),
            self.ratio,
        );
        self.clutter = Some(clutter);
        (clean, reseeded)
    }
}

fn check_ratio(ratio: f32) -> SensorResult<()> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(SensorError::InvalidRatio(ratio))
    }
}

impl ProcessingStage for ClutterRemovalFilter {
    fn initialize(&mut self, config: &StageConfig) -> SensorResult<()> {
        self.set_ratio(config.signal_clutter_ratio)
    }

    fn execute(&mut self, input: StageInput) -> SensorResult<StageOutput> {
        let (clean, reseeded) = self.process_tracked(input.frame.view());
        let residual_rms = StatsHelper::rms(clean.iter());

        let mut notes = Vec::new();
        if reseeded {
            notes.push(format!(
                "clutter seeded at frame {}",
                input.frame_number.unwrap_or_default()
            ));
        }
        self.logger.detail(&format!(
            "frame {:?} residual RMS {:.4}",
            input.frame_number, residual_rms
        ));

        Ok(StageOutput {
            frame: clean,
            metadata: StageMetadata {
                residual_rms: Some(residual_rms),
                reseeded,
                notes,
            },
        })
    }

    fn cleanup(&mut self) {
        self.reset();
    }
}
