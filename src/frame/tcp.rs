// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP header of Modbus TCP frames.

use rand::RngCore;

use super::MAX_PDU_SIZE;
use crate::Error;

/// Size of the MBAP header in bytes.
pub const HEADER_SIZE: usize = 7;

/// The protocol identifier of Modbus.
pub const PROTOCOL_ID: ProtocolId = 0x0000;

pub type TransactionId = u16;
pub type ProtocolId = u16;
pub type UnitId = u8;

/// The MBAP header that precedes every PDU sent over TCP.
///
/// `length` counts the unit id byte and the PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub protocol_id: ProtocolId,
    pub length: u16,
    pub unit_id: UnitId,
}

impl Header {
    /// Creates the header for a PDU of `pdu_len` bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidParameter`] if `pdu_len` exceeds
    /// [`MAX_PDU_SIZE`].
    pub fn new(
        transaction_id: TransactionId,
        unit_id: UnitId,
        pdu_len: usize,
    ) -> Result<Self, Error> {
        if pdu_len > MAX_PDU_SIZE {
            return Err(Error::invalid_parameter(format!(
                "PDU size {pdu_len} exceeds {MAX_PDU_SIZE} bytes"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let length = pdu_len as u16 + 1;
        Ok(Self {
            transaction_id,
            protocol_id: PROTOCOL_ID,
            length,
            unit_id,
        })
    }

    /// Creates the header for a PDU of `pdu_len` bytes with a transaction id
    /// drawn uniformly from `0..=65535`.
    ///
    /// # Errors
    ///
    /// See [`Header::new()`].
    pub fn random<R>(rng: &mut R, unit_id: UnitId, pdu_len: usize) -> Result<Self, Error>
    where
        R: RngCore + ?Sized,
    {
        #[allow(clippy::cast_possible_truncation)]
        let transaction_id = rng.next_u32() as TransactionId;
        Self::new(transaction_id, unit_id, pdu_len)
    }

    /// Number of PDU bytes announced by the length field.
    #[must_use]
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length.saturating_sub(1))
    }
}
