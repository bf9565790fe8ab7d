use crate::midi::check_channel;
use midipro_ports::backend::BackendError;
use midipro_ports::types::{Instrument, MIDI_CHANNELS};

/// Instrument selected on each of the 16 channels of one soundfont.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPrograms {
    channels: [Instrument; MIDI_CHANNELS as usize],
}

impl ChannelPrograms {
    /// Every channel starts on the same instrument.
    pub fn uniform(instrument: Instrument) -> Self {
        Self {
            channels: [instrument; MIDI_CHANNELS as usize],
        }
    }

    pub fn select(&mut self, channel: i32, instrument: Instrument) -> Result<(), BackendError> {
        let channel = check_channel(channel)?;
        self.channels[channel as usize] = instrument;
        Ok(())
    }

    pub fn get(&self, channel: i32) -> Result<Instrument, BackendError> {
        let channel = check_channel(channel)?;
        Ok(self.channels[channel as usize])
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, Instrument)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .map(|(channel, instrument)| (channel as i32, *instrument))
    }
}

impl Default for ChannelPrograms {
    fn default() -> Self {
        Self::uniform(Instrument::default())
    }
}
