use midipro_domain_soundfont::{
    check_bank, check_channel, check_key, check_program, check_velocity, program_select_messages,
    ChannelPrograms,
};
use midipro_ports::backend::BackendError;
use midipro_ports::types::Instrument;
use pretty_assertions::assert_eq;

#[test]
fn uniform_programs_cover_all_channels() {
    let programs = ChannelPrograms::uniform(Instrument::new(0, 5));
    let channels: Vec<_> = programs.iter().collect();

    assert_eq!(channels.len(), 16);
    assert!(channels
        .iter()
        .all(|(_, instrument)| *instrument == Instrument::new(0, 5)));
}

#[test]
fn select_updates_one_channel() {
    let mut programs = ChannelPrograms::default();
    programs.select(9, Instrument::new(128, 0)).unwrap();

    assert_eq!(programs.get(9), Ok(Instrument::new(128, 0)));
    assert_eq!(programs.get(0), Ok(Instrument::default()));
}

#[test]
fn out_of_range_channel_is_rejected() {
    let mut programs = ChannelPrograms::default();

    assert_eq!(
        programs.select(16, Instrument::default()),
        Err(BackendError::OutOfRange {
            what: "channel",
            value: 16
        })
    );
    assert!(programs.get(-1).is_err());
}

#[test]
fn note_ranges() {
    assert_eq!(check_channel(15), Ok(15));
    assert_eq!(check_key(127), Ok(127));
    assert!(check_key(128).is_err());
    assert_eq!(check_velocity(0), Ok(0));
    assert!(check_velocity(-1).is_err());
}

#[test]
fn program_select_sends_bank_then_program() {
    assert_eq!(
        program_select_messages(0, 1, 5),
        [(0xB0, 0x00, 1), (0xC0, 5, 0)]
    );
}

#[test]
fn percussion_bank_is_sent_as_is_on_melodic_channels() {
    assert_eq!(
        program_select_messages(0, 128, 0),
        [(0xB0, 0x00, 128), (0xC0, 0, 0)]
    );
}

#[test]
fn drum_channel_bank_is_shifted_by_the_percussion_offset() {
    assert_eq!(
        program_select_messages(9, 128, 0),
        [(0xB0, 0x00, 0), (0xC0, 0, 0)]
    );
    assert_eq!(
        program_select_messages(9, 0, 5),
        [(0xB0, 0x00, -128), (0xC0, 5, 0)]
    );
}

#[test]
fn bank_and_program_ranges() {
    assert_eq!(check_bank(128), Ok(128));
    assert!(check_bank(129).is_err());
    assert!(check_program(128).is_err());
}
