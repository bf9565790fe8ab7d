use midipro_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use midipro_ports::types::AudioConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Output port that never touches a device. It counts opened and closed
/// streams and keeps every render callback so tests can pull audio.
#[derive(Default)]
pub struct RecordingOutput {
    fail: AtomicBool,
    fail_after: Mutex<Option<usize>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    streams: Mutex<Vec<(AudioConfig, Arc<dyn AudioRenderCallback>)>>,
}

struct RecordedStream {
    closed: Arc<AtomicUsize>,
}

impl AudioStreamHandle for RecordedStream {
    fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every open fails while set.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Opens succeed `count` more times, then fail.
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock() = Some(self.opened() + count);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.opened() - self.closed()
    }

    /// Config of the most recently opened stream.
    pub fn last_config(&self) -> Option<AudioConfig> {
        self.streams.lock().last().map(|(config, _)| *config)
    }

    /// Renders `frames` frames from the most recently opened stream and
    /// returns the loudest sample seen on either side.
    pub fn render_peak(&self, frames: usize) -> f32 {
        let callback = match self.streams.lock().last() {
            Some((_, callback)) => callback.clone(),
            None => return 0.0,
        };
        let mut left = vec![0.0f32; frames];
        let mut right = vec![0.0f32; frames];
        callback.render(0, &mut left, &mut right);
        left.iter()
            .chain(right.iter())
            .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }
}

impl AudioOutputPort for RecordingOutput {
    fn open_output(
        &self,
        config: AudioConfig,
        cb: Arc<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AudioError::NoDevice);
        }
        if let Some(limit) = *self.fail_after.lock() {
            if self.opened() >= limit {
                return Err(AudioError::Backend("device busy".to_string()));
            }
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.streams.lock().push((config, cb));
        Ok(Box::new(RecordedStream {
            closed: self.closed.clone(),
        }))
    }
}
