use midipro_domain_soundfont::{
    check_key, check_program, check_velocity, program_select_messages, SoundfontRegistry,
};
use midipro_ports::audio::{AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use midipro_ports::backend::{BackendError, BackendKind, PlaybackBackend};
use midipro_ports::types::{AudioConfig, SampleTime, SoundfontId};
use parking_lot::{Mutex, MutexGuard};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The sampler plays everything on this channel.
pub const SAMPLER_CHANNEL: i32 = 0;

#[derive(Clone, Copy, Debug)]
pub struct SamplerConfig {
    pub audio: AudioConfig,
    pub max_polyphony: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            max_polyphony: 64,
        }
    }
}

/// A single sampler instrument behind one shared audio engine.
///
/// Loading a soundfont only records its path; the sampler holds one
/// instrument at a time, taken from whichever soundfont was loaded or
/// selected last. Channel arguments are ignored.
pub struct SystemSampler {
    output: Arc<dyn AudioOutputPort>,
    config: SamplerConfig,
    unit: Arc<SamplerUnit>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    registry: SoundfontRegistry<PathBuf>,
    engine: Option<Box<dyn AudioStreamHandle>>,
    disposed: bool,
}

impl State {
    fn require_engine(&self) -> Result<(), BackendError> {
        if self.engine.is_none() {
            return Err(BackendError::Engine("audio engine is not running".to_string()));
        }
        Ok(())
    }

    fn stop_engine(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.close();
            debug!("sampler engine stopped");
        }
    }
}

#[derive(Default)]
struct SamplerUnit {
    synth: Mutex<Option<Synthesizer>>,
}

impl AudioRenderCallback for SamplerUnit {
    fn render(&self, _at: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        match self.synth.try_lock() {
            Some(mut guard) => match guard.as_mut() {
                Some(synth) => synth.render(&mut out_l[..frames], &mut out_r[..frames]),
                None => {
                    out_l.fill(0.0);
                    out_r.fill(0.0);
                }
            },
            None => {
                out_l.fill(0.0);
                out_r.fill(0.0);
            }
        }
    }
}

impl SamplerUnit {
    fn with_synth<T>(&self, f: impl FnOnce(&mut Synthesizer) -> T) -> Option<T> {
        let mut guard = self.synth.lock();
        guard.as_mut().map(f)
    }
}

impl SystemSampler {
    pub fn new(output: Arc<dyn AudioOutputPort>, config: SamplerConfig) -> Self {
        Self {
            output,
            config,
            unit: Arc::new(SamplerUnit::default()),
            state: Mutex::new(State::default()),
        }
    }

    pub fn is_engine_running(&self) -> bool {
        self.state.lock().engine.is_some()
    }

    fn live_state(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(BackendError::Disposed);
        }
        Ok(state)
    }

    fn start_engine(&self, state: &mut State) -> Result<(), BackendError> {
        if state.engine.is_none() {
            let engine = self.output.open_output(self.config.audio, self.unit.clone())?;
            state.engine = Some(engine);
            debug!("sampler engine started");
        }
        Ok(())
    }

    /// Builds a sampler instrument playing `program` from the soundfont at
    /// `path`. Runs without the state lock; reading a file can block.
    fn read_instrument(&self, path: &Path, program: i32) -> Result<Synthesizer, BackendError> {
        let file = File::open(path)
            .map_err(|e| BackendError::SoundfontLoad(format!("{}: {}", path.display(), e)))?;
        let sound_font = SoundFont::new(&mut BufReader::new(file))
            .map_err(|e| BackendError::SoundfontLoad(format!("{}: {:?}", path.display(), e)))?;
        let sound_font = Arc::new(sound_font);

        let mut settings = SynthesizerSettings::new(self.config.audio.sample_rate_hz as i32);
        settings.maximum_polyphony = self.config.max_polyphony;
        let mut synth = Synthesizer::new(&sound_font, &settings)
            .map_err(|e| BackendError::Engine(e.to_string()))?;
        for (command, data1, data2) in program_select_messages(SAMPLER_CHANNEL, 0, program) {
            synth.process_midi_message(SAMPLER_CHANNEL, command, data1, data2);
        }
        Ok(synth)
    }

    fn install(&self, synth: Synthesizer) {
        *self.unit.synth.lock() = Some(synth);
    }
}

impl PlaybackBackend for SystemSampler {
    fn kind(&self) -> BackendKind {
        BackendKind::SystemSampler
    }

    fn load_soundfont(
        &self,
        path: &Path,
        _bank: i32,
        _program: i32,
    ) -> Result<SoundfontId, BackendError> {
        self.start_engine(&mut *self.live_state()?)?;
        let synth = self.read_instrument(path, 0)?;

        let mut state = self.live_state()?;
        // An unload may have stopped the engine while the file was read.
        self.start_engine(&mut state)?;
        self.install(synth);
        let sf_id = state.registry.insert(path.to_path_buf());
        info!(%sf_id, path = %path.display(), "sampler soundfont loaded");
        Ok(sf_id)
    }

    fn select_instrument(
        &self,
        sf_id: SoundfontId,
        _channel: i32,
        _bank: i32,
        program: i32,
    ) -> Result<i32, BackendError> {
        let path = self.live_state()?.registry.get(sf_id)?.clone();
        let program = check_program(program)?;
        let synth = self.read_instrument(&path, program)?;

        let state = self.live_state()?;
        state.registry.get(sf_id)?;
        self.install(synth);
        debug!(%sf_id, program, "sampler instrument selected");
        Ok(0)
    }

    fn play_note(
        &self,
        _channel: i32,
        key: i32,
        velocity: i32,
        sf_id: SoundfontId,
    ) -> Result<i32, BackendError> {
        let state = self.live_state()?;
        state.registry.get(sf_id)?;
        let key = check_key(key)?;
        let velocity = check_velocity(velocity)?;
        state.require_engine()?;
        self.unit
            .with_synth(|synth| synth.note_on(SAMPLER_CHANNEL, key, velocity))
            .ok_or_else(|| BackendError::Engine("no instrument loaded".to_string()))?;
        Ok(0)
    }

    fn stop_note(&self, _channel: i32, key: i32, sf_id: SoundfontId) -> Result<i32, BackendError> {
        let state = self.live_state()?;
        state.registry.get(sf_id)?;
        let key = check_key(key)?;
        state.require_engine()?;
        self.unit
            .with_synth(|synth| synth.note_off(SAMPLER_CHANNEL, key))
            .ok_or_else(|| BackendError::Engine("no instrument loaded".to_string()))?;
        Ok(0)
    }

    fn stop_all_notes(&self) -> Result<i32, BackendError> {
        let _state = self.live_state()?;
        self.unit.with_synth(|synth| synth.note_off_all(false));
        Ok(0)
    }

    fn unload_soundfont(&self, sf_id: SoundfontId) -> Result<i32, BackendError> {
        let mut state = self.live_state()?;
        state.registry.remove(sf_id)?;
        state.stop_engine();
        info!(%sf_id, "sampler soundfont unloaded");
        Ok(0)
    }

    fn dispose(&self) -> Result<i32, BackendError> {
        let mut state = self.live_state()?;
        state.disposed = true;
        let count = state.registry.drain().len();
        state.stop_engine();
        *self.unit.synth.lock() = None;
        info!(count, "system sampler disposed");
        Ok(0)
    }

    fn loaded_soundfonts(&self) -> Vec<SoundfontId> {
        self.state.lock().registry.ids()
    }
}
