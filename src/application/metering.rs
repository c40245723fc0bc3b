//! Input level metering loop
//!
//! Samples the analyser once per frame and publishes the averaged level on
//! a watch channel. The loop is an owned handle: cancelling it sets a flag
//! checked under the analyser lock and aborts the task, so no sample is
//! taken once teardown has started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::recording::level_from_spectrum;

use super::ports::LevelAnalyser;

/// Handle to a running metering loop. Dropping it cancels the loop.
pub(crate) struct MeterLoop {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl MeterLoop {
    /// Spawn the loop on the current tokio runtime
    pub(crate) fn spawn<A: LevelAnalyser>(
        analyser: Arc<Mutex<A>>,
        level: Arc<watch::Sender<f32>>,
        frame_interval: Duration,
        reference: f32,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = tokio::spawn(async move {
            let mut ticker = interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut bins = Vec::new();

            loop {
                ticker.tick().await;
                if !sample_frame(&analyser, &flag, &level, &mut bins, reference) {
                    break;
                }
            }
        });

        Self {
            cancelled,
            task: Some(task),
        }
    }

    /// Stop the loop. Idempotent.
    pub(crate) fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MeterLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Take one level sample. Returns `false` once the loop has been cancelled.
fn sample_frame<A: LevelAnalyser>(
    analyser: &Mutex<A>,
    cancelled: &AtomicBool,
    level: &watch::Sender<f32>,
    bins: &mut Vec<u8>,
    reference: f32,
) -> bool {
    let mut analyser = analyser.lock().unwrap_or_else(PoisonError::into_inner);
    if cancelled.load(Ordering::SeqCst) {
        return false;
    }

    bins.resize(analyser.frequency_bin_count(), 0);
    analyser.byte_frequency_data(bins);
    level.send_replace(level_from_spectrum(bins, reference));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MediaError;

    struct ConstantAnalyser {
        value: u8,
        frames: usize,
    }

    impl LevelAnalyser for ConstantAnalyser {
        fn frequency_bin_count(&self) -> usize {
            8
        }

        fn byte_frequency_data(&mut self, bins: &mut [u8]) {
            self.frames += 1;
            bins.fill(self.value);
        }

        fn close(&mut self) -> Result<(), MediaError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_level_each_frame() {
        let analyser = Arc::new(Mutex::new(ConstantAnalyser {
            value: 64,
            frames: 0,
        }));
        let (tx, rx) = watch::channel(0.0);
        let _meter = MeterLoop::spawn(
            Arc::clone(&analyser),
            Arc::new(tx),
            Duration::from_millis(16),
            128.0,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!((*rx.borrow() - 0.5).abs() < f32::EPSILON);
        assert!(analyser.lock().unwrap().frames >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_loop_stops_sampling() {
        let analyser = Arc::new(Mutex::new(ConstantAnalyser {
            value: 128,
            frames: 0,
        }));
        let (tx, _rx) = watch::channel(0.0);
        let mut meter = MeterLoop::spawn(
            Arc::clone(&analyser),
            Arc::new(tx),
            Duration::from_millis(16),
            128.0,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        meter.cancel();
        let frames = analyser.lock().unwrap().frames;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(analyser.lock().unwrap().frames, frames);
    }

    #[test]
    fn sample_frame_refuses_after_cancel() {
        let analyser = Mutex::new(ConstantAnalyser {
            value: 200,
            frames: 0,
        });
        let cancelled = AtomicBool::new(true);
        let (tx, rx) = watch::channel(0.0);
        let mut bins = Vec::new();

        assert!(!sample_frame(&analyser, &cancelled, &tx, &mut bins, 128.0));
        assert_eq!(*rx.borrow(), 0.0);
        assert_eq!(analyser.lock().unwrap().frames, 0);
    }
}
