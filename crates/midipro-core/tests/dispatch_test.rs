use midipro_core::{
    Dispatcher, DispatcherConfig, ErrorCode, Lifecycle, MethodCall, MethodError, Reply,
};
use midipro_domain_soundfont::SoundfontRegistry;
use midipro_ports::backend::{BackendError, BackendKind, PlaybackBackend};
use midipro_ports::types::{Instrument, SoundfontId, Volume01};
use midipro_ports::volume::OutputVolumePort;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeBackend {
    kind: BackendKind,
    load_delay: Duration,
    loads: AtomicUsize,
    registry: Mutex<SoundfontRegistry<PathBuf>>,
    selections: Mutex<Vec<(SoundfontId, i32, Instrument)>>,
    notes: Mutex<Vec<(i32, i32, i32, SoundfontId)>>,
}

impl FakeBackend {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            load_delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
            registry: Mutex::new(SoundfontRegistry::new()),
            selections: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

impl PlaybackBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn load_soundfont(
        &self,
        path: &Path,
        _bank: i32,
        _program: i32,
    ) -> Result<SoundfontId, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);
        if path.to_string_lossy().contains("missing") {
            return Err(BackendError::SoundfontLoad("no such file".into()));
        }
        Ok(self.registry.lock().insert(path.to_path_buf()))
    }

    fn select_instrument(
        &self,
        sf_id: SoundfontId,
        channel: i32,
        bank: i32,
        program: i32,
    ) -> Result<i32, BackendError> {
        self.registry.lock().get(sf_id)?;
        self.selections
            .lock()
            .push((sf_id, channel, Instrument::new(bank, program)));
        Ok(0)
    }

    fn play_note(
        &self,
        channel: i32,
        key: i32,
        velocity: i32,
        sf_id: SoundfontId,
    ) -> Result<i32, BackendError> {
        self.registry.lock().get(sf_id)?;
        self.notes.lock().push((channel, key, velocity, sf_id));
        Ok(0)
    }

    fn stop_note(&self, channel: i32, key: i32, sf_id: SoundfontId) -> Result<i32, BackendError> {
        self.registry.lock().get(sf_id)?;
        self.notes.lock().push((channel, key, 0, sf_id));
        Ok(0)
    }

    fn stop_all_notes(&self) -> Result<i32, BackendError> {
        self.notes.lock().clear();
        Ok(0)
    }

    fn unload_soundfont(&self, sf_id: SoundfontId) -> Result<i32, BackendError> {
        self.registry.lock().remove(sf_id)?;
        Ok(0)
    }

    fn dispose(&self) -> Result<i32, BackendError> {
        self.registry.lock().drain();
        Ok(0)
    }

    fn loaded_soundfonts(&self) -> Vec<SoundfontId> {
        self.registry.lock().ids()
    }

    fn get_int(&self, sf_id: SoundfontId, name: &str) -> Result<i32, BackendError> {
        if self.kind == BackendKind::SystemSampler {
            return Err(BackendError::Unsupported(self.kind));
        }
        self.registry.lock().get(sf_id)?;
        match name {
            "synth.midi-channels" => Ok(16),
            other => Err(BackendError::UnknownSetting(other.to_string())),
        }
    }

    fn get_num(&self, sf_id: SoundfontId, name: &str) -> Result<f64, BackendError> {
        if self.kind == BackendKind::SystemSampler {
            return Err(BackendError::Unsupported(self.kind));
        }
        self.registry.lock().get(sf_id)?;
        match name {
            "synth.gain" => Ok(1.0),
            other => Err(BackendError::UnknownSetting(other.to_string())),
        }
    }
}

struct RecordingVolume {
    current: Mutex<Volume01>,
    history: Mutex<Vec<Volume01>>,
}

impl RecordingVolume {
    fn at(volume: f32) -> Self {
        Self {
            current: Mutex::new(Volume01::new(volume)),
            history: Mutex::new(Vec::new()),
        }
    }
}

impl OutputVolumePort for RecordingVolume {
    fn volume(&self) -> Volume01 {
        *self.current.lock()
    }

    fn set_volume(&self, volume: Volume01) {
        *self.current.lock() = volume;
        self.history.lock().push(volume);
    }
}

fn config() -> DispatcherConfig {
    DispatcherConfig {
        load_settle: Duration::from_millis(10),
    }
}

fn setup(backend: FakeBackend) -> (Dispatcher, Arc<FakeBackend>, Arc<RecordingVolume>) {
    let backend = Arc::new(backend);
    let volume = Arc::new(RecordingVolume::at(0.8));
    let dispatcher = Dispatcher::new(backend.clone(), volume.clone(), config());
    (dispatcher, backend, volume)
}

fn load(path: &str) -> MethodCall {
    MethodCall::new("loadSoundfont").arg("path", path)
}

fn play(channel: i32, key: i32, velocity: i32, sf_id: i32) -> MethodCall {
    MethodCall::new("playNote")
        .arg("channel", channel)
        .arg("key", key)
        .arg("velocity", velocity)
        .arg("sfId", sf_id)
}

fn code(result: Result<Reply, MethodError>) -> ErrorCode {
    match result {
        Ok(reply) => panic!("expected an error, got {reply:?}"),
        Err(err) => err.code,
    }
}

#[tokio::test]
async fn handles_are_monotonic_and_never_reused() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::NativeSynth));

    assert_eq!(dispatcher.call(load("a.sf2")).await, Ok(Reply::Int(1)));
    assert_eq!(dispatcher.call(load("b.sf2")).await, Ok(Reply::Int(2)));
    assert_eq!(
        dispatcher
            .call(MethodCall::new("unloadSoundfont").arg("sfId", 1))
            .await,
        Ok(Reply::Int(0))
    );
    assert_eq!(dispatcher.call(load("c.sf2")).await, Ok(Reply::Int(3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_load_while_one_is_in_flight_is_rejected() {
    let (dispatcher, backend, _) =
        setup(FakeBackend::new(BackendKind::NativeSynth).slow(Duration::from_millis(200)));

    let first = dispatcher.submit(load("a.sf2"));
    assert!(dispatcher.is_loading());
    let second = dispatcher.submit(load("b.sf2"));

    let err = second.await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LoadInProgress);
    assert_eq!(first.await, Ok(Reply::Int(1)));
    assert_eq!(backend.loads.load(Ordering::SeqCst), 1);

    assert!(!dispatcher.is_loading());
    assert_eq!(dispatcher.call(load("b.sf2")).await, Ok(Reply::Int(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn other_calls_run_while_a_load_is_in_flight() {
    let (dispatcher, backend, _) = {
        let backend = FakeBackend::new(BackendKind::NativeSynth).slow(Duration::from_millis(200));
        backend.registry.lock().insert(PathBuf::from("a.sf2"));
        setup(backend)
    };
    let pending = dispatcher.submit(load("b.sf2"));
    assert_eq!(dispatcher.call(play(0, 60, 100, 1)).await, Ok(Reply::Int(0)));
    assert!(dispatcher.is_loading());
    assert_eq!(pending.await, Ok(Reply::Int(2)));
    assert_eq!(backend.notes.lock().as_slice(), &[(0, 60, 100, SoundfontId(1))]);
}

#[tokio::test]
async fn load_mutes_output_and_restores_previous_volume() {
    let (dispatcher, _, volume) = setup(FakeBackend::new(BackendKind::NativeSynth));

    assert_eq!(dispatcher.call(load("a.sf2")).await, Ok(Reply::Int(1)));

    assert_eq!(
        volume.history.lock().as_slice(),
        &[Volume01::MUTED, Volume01::new(0.8)]
    );
    assert_eq!(volume.volume(), Volume01::new(0.8));
}

#[tokio::test]
async fn failed_load_restores_volume_and_reports_invalid_argument() {
    let (dispatcher, backend, volume) = setup(FakeBackend::new(BackendKind::NativeSynth));

    let err = dispatcher.call(load("missing.sf2")).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidArgument);
    assert_eq!(err.details, Some(json!({ "reason": "no such file" })));
    assert_eq!(
        volume.history.lock().as_slice(),
        &[Volume01::MUTED, Volume01::new(0.8)]
    );
    assert_eq!(dispatcher.lifecycle(), Lifecycle::Uninitialized);
    assert!(!dispatcher.is_loading());
    assert_eq!(backend.loaded_soundfonts(), vec![]);
}

#[tokio::test]
async fn first_successful_load_makes_the_player_ready() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::NativeSynth));
    assert_eq!(dispatcher.lifecycle(), Lifecycle::Uninitialized);

    dispatcher.call(load("a.sf2")).await.unwrap();

    assert_eq!(dispatcher.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn load_select_play_unload_scenario() {
    let (dispatcher, backend, _) = setup(FakeBackend::new(BackendKind::NativeSynth));

    assert_eq!(dispatcher.call(load("a.sf2")).await, Ok(Reply::Int(1)));
    let select = MethodCall::new("selectInstrument")
        .arg("sfId", 1)
        .arg("channel", 0)
        .arg("bank", 0)
        .arg("program", 5);
    assert_eq!(dispatcher.call(select).await, Ok(Reply::Int(0)));
    assert_eq!(dispatcher.call(play(0, 64, 90, 1)).await, Ok(Reply::Int(0)));
    assert_eq!(
        dispatcher
            .call(MethodCall::new("unloadSoundfont").arg("sfId", 1))
            .await,
        Ok(Reply::Int(0))
    );

    let err = dispatcher.call(play(0, 64, 90, 1)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::FluidsynthError);
    assert_eq!(
        backend.selections.lock().as_slice(),
        &[(SoundfontId(1), 0, Instrument::new(0, 5))]
    );
}

#[tokio::test]
async fn play_note_without_soundfont_reports_unknown_handle() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::NativeSynth));

    let err = dispatcher.call(play(0, 60, 100, 1)).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::FluidsynthError);
    assert_eq!(
        err.details,
        Some(json!({ "code": -1, "sfId": 1, "reason": "unknown_soundfont" }))
    );
    assert!(err.message.starts_with("Failed to play note"));
}

#[tokio::test]
async fn sampler_failures_use_sampler_code() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::SystemSampler));

    let result = dispatcher.call(play(0, 60, 100, 1)).await;

    assert_eq!(code(result), ErrorCode::SamplerError);
}

#[tokio::test]
async fn select_instrument_fills_in_defaults() {
    let (dispatcher, backend, _) = setup(FakeBackend::new(BackendKind::NativeSynth));
    dispatcher.call(load("a.sf2")).await.unwrap();

    let result = dispatcher.call(MethodCall::new("selectInstrument")).await;

    assert_eq!(result, Ok(Reply::Int(0)));
    assert_eq!(
        backend.selections.lock().as_slice(),
        &[(SoundfontId(1), 0, Instrument::new(0, 0))]
    );
}

#[tokio::test]
async fn missing_or_mistyped_arguments_are_invalid() {
    let (dispatcher, backend, volume) = setup(FakeBackend::new(BackendKind::NativeSynth));

    let no_path = dispatcher.call(MethodCall::new("loadSoundfont")).await;
    let no_velocity = dispatcher
        .call(
            MethodCall::new("playNote")
                .arg("channel", 0)
                .arg("key", 60)
                .arg("sfId", 1),
        )
        .await;
    let string_key = dispatcher
        .call(
            MethodCall::new("stopNote")
                .arg("channel", 0)
                .arg("key", "60")
                .arg("sfId", 1),
        )
        .await;

    assert_eq!(code(no_path), ErrorCode::InvalidArgument);
    assert_eq!(code(no_velocity), ErrorCode::InvalidArgument);
    assert_eq!(code(string_key), ErrorCode::InvalidArgument);
    assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
    assert!(volume.history.lock().is_empty());
}

#[tokio::test]
async fn unknown_method_is_not_implemented() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::NativeSynth));

    let err = dispatcher
        .call(MethodCall::new("bendPitch"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::NotImplemented);
    assert_eq!(err.message, "bendPitch is not implemented");
}

#[tokio::test]
async fn settings_are_read_through_the_backend() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::NativeSynth));
    dispatcher.call(load("a.sf2")).await.unwrap();

    let channels = dispatcher
        .call(MethodCall::new("getInt").arg("name", "synth.midi-channels"))
        .await;
    let gain = dispatcher
        .call(
            MethodCall::new("getNum")
                .arg("sfId", 1)
                .arg("name", "synth.gain"),
        )
        .await;

    assert_eq!(channels, Ok(Reply::Int(16)));
    assert_eq!(gain, Ok(Reply::Num(1.0)));
}

#[tokio::test]
async fn settings_on_the_sampler_are_not_implemented() {
    let (dispatcher, _, _) = setup(FakeBackend::new(BackendKind::SystemSampler));
    dispatcher.call(load("a.sf2")).await.unwrap();

    let set = dispatcher
        .call(
            MethodCall::new("setNum")
                .arg("name", "synth.gain")
                .arg("value", 0.5),
        )
        .await;
    let get = dispatcher
        .call(MethodCall::new("getInt").arg("name", "synth.polyphony"))
        .await;

    assert_eq!(code(set), ErrorCode::NotImplemented);
    assert_eq!(code(get), ErrorCode::NotImplemented);
}

#[tokio::test]
async fn dispose_is_terminal() {
    let (dispatcher, backend, _) = setup(FakeBackend::new(BackendKind::NativeSynth));
    dispatcher.call(load("a.sf2")).await.unwrap();
    dispatcher.call(load("b.sf2")).await.unwrap();

    assert_eq!(
        dispatcher.call(MethodCall::new("dispose")).await,
        Ok(Reply::Int(0))
    );

    assert_eq!(dispatcher.lifecycle(), Lifecycle::Disposed);
    assert_eq!(backend.loaded_soundfonts(), vec![]);
    assert_eq!(code(dispatcher.call(play(0, 60, 100, 1)).await), ErrorCode::Disposed);
    assert_eq!(code(dispatcher.call(load("c.sf2")).await), ErrorCode::Disposed);
    assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_all_notes_reaches_the_backend() {
    let (dispatcher, backend, _) = setup(FakeBackend::new(BackendKind::NativeSynth));
    dispatcher.call(load("a.sf2")).await.unwrap();
    dispatcher.call(play(3, 60, 100, 1)).await.unwrap();

    let result = dispatcher.call(MethodCall::new("stopAllNotes")).await;

    assert_eq!(result, Ok(Reply::Int(0)));
    assert!(backend.notes.lock().is_empty());
}

#[tokio::test]
async fn dropping_a_pending_reply_does_not_cancel_the_call() {
    let (dispatcher, backend, _) = setup(FakeBackend::new(BackendKind::NativeSynth));

    drop(dispatcher.submit(load("a.sf2")));
    while dispatcher.is_loading() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(backend.loaded_soundfonts(), vec![SoundfontId(1)]);
    assert_eq!(dispatcher.backend_kind(), BackendKind::NativeSynth);
}
