use std::path::{Path, PathBuf};

/// Bank 0 program 0: a looped sample of silence.
pub const SILENT_PROGRAM: i32 = 0;
/// Bank 0 program 5: a looped square wave.
pub const TONE_PROGRAM: i32 = 5;
/// Bank 128 program 0: the square wave again, filed as a drum kit.
pub const KIT_BANK: i32 = 128;

const SAMPLE_RATE: u32 = 44_100;
const ROOT_KEY: u8 = 60;
/// Frames per sample, followed by as many frames of zero padding.
const SAMPLE_FRAMES: u32 = 48;

const GEN_INSTRUMENT: u16 = 41;
const GEN_SAMPLE_ID: u16 = 53;
const GEN_SAMPLE_MODES: u16 = 54;
const LOOP_CONTINUOUSLY: u16 = 1;
const MONO_SAMPLE: u16 = 1;

struct PresetDef {
    name: &'static str,
    bank: u16,
    program: u16,
    instrument: u16,
}

const PRESETS: [PresetDef; 3] = [
    PresetDef {
        name: "Silence",
        bank: 0,
        program: SILENT_PROGRAM as u16,
        instrument: 0,
    },
    PresetDef {
        name: "Square",
        bank: 0,
        program: TONE_PROGRAM as u16,
        instrument: 1,
    },
    PresetDef {
        name: "Square Kit",
        bank: KIT_BANK as u16,
        program: 0,
        instrument: 1,
    },
];

/// Instruments and samples pair up one to one.
const INSTRUMENTS: [&str; 2] = ["Silence", "Square"];

/// A complete SoundFont 2 bank in memory, small enough to build per test.
pub fn minimal_sf2() -> Vec<u8> {
    let info = list(
        b"INFO",
        &[
            chunk(b"ifil", &[2, 0, 1, 0]),
            chunk(b"INAM", b"midipro fixture\0"),
        ],
    );
    let sdta = list(b"sdta", &[chunk(b"smpl", &wave_data())]);
    let pdta = list(
        b"pdta",
        &[
            chunk(b"phdr", &preset_headers()),
            chunk(b"pbag", &bags(PRESETS.len(), 1)),
            chunk(b"pgen", &preset_generators()),
            chunk(b"inst", &instrument_headers()),
            chunk(b"ibag", &bags(INSTRUMENTS.len(), 2)),
            chunk(b"igen", &instrument_generators()),
            chunk(b"shdr", &sample_headers()),
        ],
    );

    let mut body = b"sfbk".to_vec();
    body.extend(info);
    body.extend(sdta);
    body.extend(pdta);
    chunk(b"RIFF", &body)
}

/// Writes [`minimal_sf2`] to `dir/name` and returns the path.
pub fn write_soundfont(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, minimal_sf2()).expect("write soundfont fixture");
    path
}

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(id);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn list(kind: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = kind.to_vec();
    for sub in chunks {
        body.extend_from_slice(sub);
    }
    chunk(b"LIST", &body)
}

fn name20(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 20];
    let len = name.len().min(19);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    out.extend_from_slice(&field);
}

fn u16le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn u32le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn wave_data() -> Vec<u8> {
    let mut frames: Vec<i16> = Vec::new();
    // Silence.
    frames.extend(std::iter::repeat(0).take(2 * SAMPLE_FRAMES as usize));
    // Square, eight frames per half period.
    for i in 0..SAMPLE_FRAMES {
        frames.push(if (i / 8) % 2 == 0 { 12_000 } else { -12_000 });
    }
    frames.extend(std::iter::repeat(0).take(SAMPLE_FRAMES as usize));
    frames.iter().flat_map(|frame| frame.to_le_bytes()).collect()
}

fn preset_headers() -> Vec<u8> {
    let mut out = Vec::new();
    for (bag, preset) in PRESETS.iter().enumerate() {
        name20(&mut out, preset.name);
        u16le(&mut out, preset.program);
        u16le(&mut out, preset.bank);
        u16le(&mut out, bag as u16);
        out.extend_from_slice(&[0; 12]); // library, genre, morphology
    }
    name20(&mut out, "EOP");
    out.extend_from_slice(&[0; 4]);
    u16le(&mut out, PRESETS.len() as u16);
    out.extend_from_slice(&[0; 12]);
    out
}

/// One zone per record, each holding `generators` generators, plus the
/// terminal record.
fn bags(records: usize, generators: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..=records {
        u16le(&mut out, (i * generators) as u16);
        u16le(&mut out, 0);
    }
    out
}

fn preset_generators() -> Vec<u8> {
    let mut out = Vec::new();
    for preset in &PRESETS {
        u16le(&mut out, GEN_INSTRUMENT);
        u16le(&mut out, preset.instrument);
    }
    out.extend_from_slice(&[0; 4]);
    out
}

fn instrument_headers() -> Vec<u8> {
    let mut out = Vec::new();
    for (bag, name) in INSTRUMENTS.iter().enumerate() {
        name20(&mut out, name);
        u16le(&mut out, bag as u16);
    }
    name20(&mut out, "EOI");
    u16le(&mut out, INSTRUMENTS.len() as u16);
    out
}

/// The sample id has to be the last generator of an instrument zone.
fn instrument_generators() -> Vec<u8> {
    let mut out = Vec::new();
    for sample in 0..INSTRUMENTS.len() {
        u16le(&mut out, GEN_SAMPLE_MODES);
        u16le(&mut out, LOOP_CONTINUOUSLY);
        u16le(&mut out, GEN_SAMPLE_ID);
        u16le(&mut out, sample as u16);
    }
    out.extend_from_slice(&[0; 4]);
    out
}

fn sample_headers() -> Vec<u8> {
    let mut out = Vec::new();
    for (i, name) in INSTRUMENTS.iter().enumerate() {
        let start = i as u32 * 2 * SAMPLE_FRAMES;
        name20(&mut out, name);
        u32le(&mut out, start);
        u32le(&mut out, start + SAMPLE_FRAMES);
        u32le(&mut out, start + 8);
        u32le(&mut out, start + SAMPLE_FRAMES - 8);
        u32le(&mut out, SAMPLE_RATE);
        out.push(ROOT_KEY);
        out.push(0); // pitch correction
        u16le(&mut out, 0); // link
        u16le(&mut out, MONO_SAMPLE);
    }
    name20(&mut out, "EOS");
    out.extend_from_slice(&[0; 26]);
    out
}
