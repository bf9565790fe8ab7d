use midipro_ports::backend::BackendError;
use midipro_ports::types::MIDI_CHANNELS;

pub const MIDI_CC_BANK_SELECT: i32 = 0x00;
pub const MIDI_CONTROL_CHANGE: i32 = 0xB0;
pub const MIDI_PROGRAM_CHANGE: i32 = 0xC0;

/// Soundfont bank holding drum kits.
pub const PERCUSSION_BANK: i32 = 128;

/// Channel the synthesizer reads banks on with a +128 offset (GM channel 10).
pub const PERCUSSION_CHANNEL: i32 = 9;

pub fn check_channel(channel: i32) -> Result<i32, BackendError> {
    check_range("channel", channel, 0, MIDI_CHANNELS as i32 - 1)
}

pub fn check_key(key: i32) -> Result<i32, BackendError> {
    check_range("key", key, 0, 127)
}

pub fn check_velocity(velocity: i32) -> Result<i32, BackendError> {
    check_range("velocity", velocity, 0, 127)
}

pub fn check_program(program: i32) -> Result<i32, BackendError> {
    check_range("program", program, 0, 127)
}

pub fn check_bank(bank: i32) -> Result<i32, BackendError> {
    check_range("bank", bank, 0, PERCUSSION_BANK)
}

fn check_range(what: &'static str, value: i32, min: i32, max: i32) -> Result<i32, BackendError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(BackendError::OutOfRange { what, value })
    }
}

/// MIDI messages selecting `bank`/`program` on `channel`, as
/// `(command, data1, data2)` triples.
///
/// The synthesizer adds [`PERCUSSION_BANK`] to every bank select received on
/// [`PERCUSSION_CHANNEL`], so the value sent there is shifted down by the same
/// amount. Either way the channel ends up on exactly `bank`.
pub fn program_select_messages(channel: i32, bank: i32, program: i32) -> [(i32, i32, i32); 2] {
    let bank_value = if channel == PERCUSSION_CHANNEL {
        bank - PERCUSSION_BANK
    } else {
        bank
    };
    [
        (MIDI_CONTROL_CHANGE, MIDI_CC_BANK_SELECT, bank_value),
        (MIDI_PROGRAM_CHANGE, program, 0),
    ]
}
