//! The tuning-code assignment sent by the peer.

use heapless::Vec;

use super::{Error, Result, MAX_ASSIGNED_CODES};
use crate::tuning::TuningCode;

/// A reader/writer for the code assignment packet.
///
/// ```notrust
/// +-----+---------+------------------------+----------+---------+
/// | Seq | Channel | Codes[4], 3 bytes each | Reserved |   CRC   |
/// +-----+---------+------------------------+----------+---------+
///    1       1               12                  2         2
/// ```
///
/// Unused code slots are all-zero; a zero code is not a meaningful
/// oscillator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAssignment<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> CodeAssignment<T> {
    /// Length of the packet in bytes.
    pub const LENGTH: usize = 18;

    /// Create a new [`CodeAssignment`] reader/writer from a given buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too short to contain the packet.
    pub fn new(buffer: T) -> Result<Self> {
        let assignment = Self::new_unchecked(buffer);

        if !assignment.check_len() {
            return Err(Error);
        }

        Ok(assignment)
    }

    /// Returns `false` if the buffer is too short to contain the packet.
    fn check_len(&self) -> bool {
        self.buffer.as_ref().len() >= Self::LENGTH
    }

    /// Create a new [`CodeAssignment`] reader/writer without checking the
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

    /// Return the tuning code in slot `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_ASSIGNED_CODES`.
    pub fn tuning_code(&self, slot: usize) -> TuningCode {
        assert!(slot < MAX_ASSIGNED_CODES);
        let b = &self.buffer.as_ref()[2 + 3 * slot..5 + 3 * slot];
        TuningCode::new_unchecked(b[0], b[1], b[2])
    }

    /// Return the populated (non-zero) tuning codes, in slot order.
    pub fn tuning_codes(&self) -> impl Iterator<Item = TuningCode> + '_ {
        (0..MAX_ASSIGNED_CODES)
            .map(|slot| self.tuning_code(slot))
            .filter(|code| *code != TuningCode::default())
    }

    /// Return the hardware-generated CRC.
    pub fn crc(&self) -> u16 {
        let b = &self.buffer.as_ref()[16..18];
        u16::from_le_bytes([b[0], b[1]])
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> CodeAssignment<T> {
    /// Set the sequence number.
    pub fn set_sequence_number(&mut self, sequence_number: u8) {
        self.buffer.as_mut()[0] = sequence_number;
    }

    /// Set the channel number.
    pub fn set_channel(&mut self, channel: u8) {
        self.buffer.as_mut()[1] = channel;
    }

    /// Set the tuning code in slot `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_ASSIGNED_CODES`.
    pub fn set_tuning_code(&mut self, slot: usize, code: TuningCode) {
        assert!(slot < MAX_ASSIGNED_CODES);
        let b = &mut self.buffer.as_mut()[2 + 3 * slot..5 + 3 * slot];
        b[0] = code.coarse;
        b[1] = code.mid;
        b[2] = code.fine;
    }
}

/// A high-level representation of a [`CodeAssignment`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeAssignmentRepr {
    /// The sequence number.
    pub sequence_number: u8,
    /// The channel the codes apply to.
    pub channel: u8,
    /// The assigned TX tuning codes, at most [`MAX_ASSIGNED_CODES`].
    pub tuning_codes: Vec<TuningCode, MAX_ASSIGNED_CODES>,
}

impl CodeAssignmentRepr {
    /// Parse a code assignment, collecting the populated slots.
    pub fn parse(reader: &CodeAssignment<&[u8]>) -> Self {
        let mut tuning_codes = Vec::new();
        for code in reader.tuning_codes() {
            // Cannot overflow: the reader yields at most MAX_ASSIGNED_CODES.
            tuning_codes.push(code).ok();
        }
        Self {
            sequence_number: reader.sequence_number(),
            channel: reader.channel(),
            tuning_codes,
        }
    }

    /// Return the length of the packet when emitted into a buffer.
    pub const fn buffer_len(&self) -> usize {
        CodeAssignment::<&[u8]>::LENGTH
    }

    /// Emit the packet into a buffer, zero-filling it first. Unused slots
    /// stay zero.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, writer: &mut CodeAssignment<T>) {
        writer.buffer.as_mut()[..self.buffer_len()].fill(0);
        writer.set_sequence_number(self.sequence_number);
        writer.set_channel(self.channel);
        for (slot, code) in self.tuning_codes.iter().enumerate() {
            writer.set_tuning_code(slot, *code);
        }
    }
}
