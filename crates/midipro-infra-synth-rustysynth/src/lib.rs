mod settings;

pub use settings::SynthSettings;

use midipro_domain_soundfont::{
    check_bank, check_channel, check_key, check_program, check_velocity, program_select_messages,
    ChannelPrograms, SoundfontRegistry,
};
use midipro_ports::audio::{AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use midipro_ports::backend::{BackendError, BackendKind, PlaybackBackend};
use midipro_ports::types::{
    AudioConfig, Instrument, SampleTime, SettingValue, SoundfontId, MIDI_CHANNELS,
};
use parking_lot::Mutex;
use rustysynth::{SoundFont, Synthesizer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug)]
pub struct NativeSynthConfig {
    pub audio: AudioConfig,
    pub max_polyphony: usize,
}

impl Default for NativeSynthConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            max_polyphony: 64,
        }
    }
}

/// One synthesizer and output stream per loaded soundfont, 16 channels each.
pub struct NativeSynth {
    output: Arc<dyn AudioOutputPort>,
    config: NativeSynthConfig,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    registry: SoundfontRegistry<SynthSlot>,
    disposed: bool,
}

struct SynthSlot {
    sound_font: Arc<SoundFont>,
    settings: SynthSettings,
    programs: ChannelPrograms,
    voice: Arc<SynthVoice>,
    stream: Option<Box<dyn AudioStreamHandle>>,
}

/// Render side of a slot, shared with the audio callback.
struct SynthVoice {
    synth: Mutex<Synthesizer>,
}

impl AudioRenderCallback for SynthVoice {
    fn render(&self, _at: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        match self.synth.try_lock() {
            Some(mut synth) => synth.render(&mut out_l[..frames], &mut out_r[..frames]),
            None => {
                out_l.fill(0.0);
                out_r.fill(0.0);
            }
        }
    }
}

impl SynthSlot {
    fn build_synthesizer(
        sound_font: &Arc<SoundFont>,
        settings: &SynthSettings,
        programs: &ChannelPrograms,
    ) -> Result<Synthesizer, BackendError> {
        let mut synth = Synthesizer::new(sound_font, &settings.synthesizer_settings())
            .map_err(|e| BackendError::Engine(e.to_string()))?;
        synth.set_master_volume(settings.gain());
        for (channel, instrument) in programs.iter() {
            apply_program(&mut synth, channel, instrument);
        }
        Ok(synth)
    }

    fn has_preset(&self, instrument: Instrument) -> bool {
        self.sound_font.get_presets().iter().any(|preset| {
            preset.get_bank_number() == instrument.bank
                && preset.get_patch_number() == instrument.program
        })
    }

    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }
}

fn apply_program(synth: &mut Synthesizer, channel: i32, instrument: Instrument) {
    for (command, data1, data2) in
        program_select_messages(channel, instrument.bank, instrument.program)
    {
        synth.process_midi_message(channel, command, data1, data2);
    }
}

fn read_sound_font(path: &Path) -> Result<Arc<SoundFont>, BackendError> {
    let file = File::open(path)
        .map_err(|e| BackendError::SoundfontLoad(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let sound_font = SoundFont::new(&mut reader)
        .map_err(|e| BackendError::SoundfontLoad(format!("{}: {:?}", path.display(), e)))?;
    Ok(Arc::new(sound_font))
}

impl NativeSynth {
    pub fn new(output: Arc<dyn AudioOutputPort>, config: NativeSynthConfig) -> Self {
        Self {
            output,
            config,
            state: Mutex::new(State::default()),
        }
    }

    fn live_state(&self) -> Result<parking_lot::MutexGuard<'_, State>, BackendError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(BackendError::Disposed);
        }
        Ok(state)
    }

    fn with_synth<T>(
        &self,
        sf_id: SoundfontId,
        f: impl FnOnce(&mut Synthesizer) -> T,
    ) -> Result<T, BackendError> {
        let state = self.live_state()?;
        let slot = state.registry.get(sf_id)?;
        let mut synth = slot.voice.synth.lock();
        Ok(f(&mut synth))
    }
}

impl PlaybackBackend for NativeSynth {
    fn kind(&self) -> BackendKind {
        BackendKind::NativeSynth
    }

    fn load_soundfont(
        &self,
        path: &Path,
        bank: i32,
        program: i32,
    ) -> Result<SoundfontId, BackendError> {
        drop(self.live_state()?);
        let instrument = Instrument::new(check_bank(bank)?, check_program(program)?);

        let sound_font = read_sound_font(path)?;
        let settings = SynthSettings::new(self.config.audio, self.config.max_polyphony);
        let programs = ChannelPrograms::uniform(instrument);
        let synth = SynthSlot::build_synthesizer(&sound_font, &settings, &programs)?;
        let voice = Arc::new(SynthVoice {
            synth: Mutex::new(synth),
        });
        let stream = self
            .output
            .open_output(settings.audio_config(), voice.clone())?;

        let mut slot = SynthSlot {
            sound_font,
            settings,
            programs,
            voice,
            stream: Some(stream),
        };

        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            slot.close_stream();
            return Err(BackendError::Disposed);
        }
        let sf_id = state.registry.insert(slot);
        info!(%sf_id, path = %path.display(), bank, program, "soundfont loaded");
        Ok(sf_id)
    }

    fn select_instrument(
        &self,
        sf_id: SoundfontId,
        channel: i32,
        bank: i32,
        program: i32,
    ) -> Result<i32, BackendError> {
        let mut state = self.live_state()?;
        let slot = state.registry.get_mut(sf_id)?;
        let channel = check_channel(channel)?;
        let instrument = Instrument::new(check_bank(bank)?, check_program(program)?);
        if !slot.has_preset(instrument) {
            return Err(BackendError::PresetNotFound { bank, program });
        }

        apply_program(&mut slot.voice.synth.lock(), channel, instrument);
        slot.programs.select(channel, instrument)?;
        debug!(%sf_id, channel, bank, program, "instrument selected");
        Ok(0)
    }

    fn play_note(
        &self,
        channel: i32,
        key: i32,
        velocity: i32,
        sf_id: SoundfontId,
    ) -> Result<i32, BackendError> {
        let channel = check_channel(channel)?;
        let key = check_key(key)?;
        let velocity = check_velocity(velocity)?;
        self.with_synth(sf_id, |synth| synth.note_on(channel, key, velocity))?;
        Ok(0)
    }

    fn stop_note(&self, channel: i32, key: i32, sf_id: SoundfontId) -> Result<i32, BackendError> {
        let channel = check_channel(channel)?;
        let key = check_key(key)?;
        self.with_synth(sf_id, |synth| synth.note_off(channel, key))?;
        Ok(0)
    }

    fn stop_all_notes(&self) -> Result<i32, BackendError> {
        let state = self.live_state()?;
        for (_, slot) in state.registry.iter() {
            let mut synth = slot.voice.synth.lock();
            for channel in 0..MIDI_CHANNELS as i32 {
                synth.note_off_all_channel(channel, false);
            }
        }
        Ok(0)
    }

    fn unload_soundfont(&self, sf_id: SoundfontId) -> Result<i32, BackendError> {
        let mut slot = self.live_state()?.registry.remove(sf_id)?;
        slot.close_stream();
        info!(%sf_id, "soundfont unloaded");
        Ok(0)
    }

    fn dispose(&self) -> Result<i32, BackendError> {
        let slots = {
            let mut state = self.live_state()?;
            state.disposed = true;
            state.registry.drain()
        };
        let count = slots.len();
        for (_, mut slot) in slots {
            slot.close_stream();
        }
        info!(count, "native synth disposed");
        Ok(0)
    }

    fn loaded_soundfonts(&self) -> Vec<SoundfontId> {
        self.state.lock().registry.ids()
    }

    /// Rebuilds the soundfont's synthesizer with one setting changed.
    ///
    /// The new synthesizer and, when the audio config changed, the new stream
    /// are ready before anything is swapped in, so a failure leaves the
    /// soundfont playing with its previous settings.
    fn set_setting(
        &self,
        sf_id: SoundfontId,
        name: &str,
        value: SettingValue,
    ) -> Result<i32, BackendError> {
        let (sound_font, programs, voice, previous_audio, settings) = {
            let state = self.live_state()?;
            let slot = state.registry.get(sf_id)?;
            let mut settings = slot.settings.clone();
            settings.set(name, value)?;
            (
                slot.sound_font.clone(),
                slot.programs.clone(),
                slot.voice.clone(),
                slot.settings.audio_config(),
                settings,
            )
        };

        let synth = SynthSlot::build_synthesizer(&sound_font, &settings, &programs)?;
        let audio = settings.audio_config();
        let mut stream = if audio != previous_audio {
            Some(self.output.open_output(audio, voice)?)
        } else {
            None
        };

        let swapped = {
            let mut state = self.state.lock();
            let slot = if state.disposed {
                Err(BackendError::Disposed)
            } else {
                state.registry.get_mut(sf_id)
            };
            slot.map(|slot| {
                let mut synth = synth;
                // Selections made during the rebuild win.
                if slot.programs != programs {
                    for (channel, instrument) in slot.programs.iter() {
                        apply_program(&mut synth, channel, instrument);
                    }
                }
                *slot.voice.synth.lock() = synth;
                slot.settings = settings;
                match stream.take() {
                    Some(fresh) => slot.stream.replace(fresh),
                    None => None,
                }
            })
        };

        // Streams are closed outside the lock; closing waits for the callback.
        if let Some(unused) = stream {
            unused.close();
        }
        if let Some(previous) = swapped? {
            previous.close();
        }
        debug!(%sf_id, name, "synth setting changed");
        Ok(0)
    }

    fn get_int(&self, sf_id: SoundfontId, name: &str) -> Result<i32, BackendError> {
        let state = self.live_state()?;
        state.registry.get(sf_id)?.settings.int(name)
    }

    fn get_num(&self, sf_id: SoundfontId, name: &str) -> Result<f64, BackendError> {
        let state = self.live_state()?;
        state.registry.get(sf_id)?.settings.num(name)
    }
}
