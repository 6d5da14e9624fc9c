//! The calibration report sent by the mote.

use super::{Command, Error, Result};
use crate::tuning::TuningCode;

/// A reader/writer for the calibration report packet.
///
/// ```notrust
/// +-----+---------+----------+---------+----------+----------------+----------+---------+
/// | Seq | Channel | Reserved | Command | Reserved | Coarse Mid Fine| Reserved |   CRC   |
/// +-----+---------+----------+---------+----------+----------------+----------+---------+
///    1       1         2          1         1             3              1         2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReport<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> CalibrationReport<T> {
    /// Length of the packet in bytes.
    pub const LENGTH: usize = 12;

    /// Create a new [`CalibrationReport`] reader/writer from a given buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too short to contain the packet.
    pub fn new(buffer: T) -> Result<Self> {
        let report = Self::new_unchecked(buffer);

        if !report.check_len() {
            return Err(Error);
        }

        Ok(report)
    }

    /// Returns `false` if the buffer is too short to contain the packet.
    fn check_len(&self) -> bool {
        self.buffer.as_ref().len() >= Self::LENGTH
    }

    /// Create a new [`CalibrationReport`] reader/writer without checking the
    /// buffer length.
    pub fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Return the sequence number.
    pub fn sequence_number(&self) -> u8 {
        self.buffer.as_ref()[0]
    }

    /// Return the raw channel number.
    pub fn channel(&self) -> u8 {
        self.buffer.as_ref()[1]
    }

    /// Return the [`Command`] for the peer.
    pub fn command(&self) -> Command {
        Command::from(self.buffer.as_ref()[4])
    }

    /// Return the tuning code the mote reported.
    pub fn tuning_code(&self) -> TuningCode {
        let b = &self.buffer.as_ref()[6..9];
        TuningCode::new_unchecked(b[0], b[1], b[2])
    }

    /// Return the hardware-generated CRC.
    pub fn crc(&self) -> u16 {
        let b = &self.buffer.as_ref()[10..12];
        u16::from_le_bytes([b[0], b[1]])
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> CalibrationReport<T> {
    /// Set the sequence number.
    pub fn set_sequence_number(&mut self, sequence_number: u8) {
        self.buffer.as_mut()[0] = sequence_number;
    }

    /// Set the channel number.
    pub fn set_channel(&mut self, channel: u8) {
        self.buffer.as_mut()[1] = channel;
    }

    /// Set the [`Command`] for the peer.
    pub fn set_command(&mut self, command: Command) {
        self.buffer.as_mut()[4] = command.into();
    }

    /// Set the tuning code.
    pub fn set_tuning_code(&mut self, code: TuningCode) {
        let b = &mut self.buffer.as_mut()[6..9];
        b[0] = code.coarse;
        b[1] = code.mid;
        b[2] = code.fine;
    }
}

/// A high-level representation of a [`CalibrationReport`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReportRepr {
    /// The sequence number.
    pub sequence_number: u8,
    /// The channel the report applies to.
    pub channel: u8,
    /// The command for the peer.
    pub command: Command,
    /// The reported tuning code.
    pub tuning_code: TuningCode,
}

impl CalibrationReportRepr {
    /// Parse a calibration report.
    pub fn parse(reader: &CalibrationReport<&[u8]>) -> Self {
        Self {
            sequence_number: reader.sequence_number(),
            channel: reader.channel(),
            command: reader.command(),
            tuning_code: reader.tuning_code(),
        }
    }

    /// Return the length of the packet when emitted into a buffer.
    pub const fn buffer_len(&self) -> usize {
        CalibrationReport::<&[u8]>::LENGTH
    }

    /// Emit the packet into a buffer, zero-filling it first.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, writer: &mut CalibrationReport<T>) {
        writer.buffer.as_mut()[..self.buffer_len()].fill(0);
        writer.set_sequence_number(self.sequence_number);
        writer.set_channel(self.channel);
        writer.set_command(self.command);
        writer.set_tuning_code(self.tuning_code);
    }
}
