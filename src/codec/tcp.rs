// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembling and splitting of Modbus TCP ADUs.

use byteorder::{BigEndian, ByteOrder as _};
use rand::RngCore;

use crate::{
    bytes::{BufMut as _, Bytes, BytesMut},
    frame::tcp::{Header, UnitId, HEADER_SIZE},
    Error,
};

/// Encodes the MBAP header.
#[must_use]
pub fn encode_header(hdr: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = [0; HEADER_SIZE];
    BigEndian::write_u16(&mut buf[0..2], hdr.transaction_id);
    BigEndian::write_u16(&mut buf[2..4], hdr.protocol_id);
    BigEndian::write_u16(&mut buf[4..6], hdr.length);
    buf[6] = hdr.unit_id;
    buf
}

/// Decodes the MBAP header from the first [`HEADER_SIZE`] bytes.
///
/// # Errors
///
/// Fails with [`Error::MalformedHeader`] if fewer bytes are available.
pub fn decode_header(bytes: &[u8]) -> Result<Header, Error> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::MalformedHeader(format!(
            "{} of {HEADER_SIZE} bytes available",
            bytes.len()
        )));
    }
    Ok(Header {
        transaction_id: BigEndian::read_u16(&bytes[0..2]),
        protocol_id: BigEndian::read_u16(&bytes[2..4]),
        length: BigEndian::read_u16(&bytes[4..6]),
        unit_id: bytes[6],
    })
}

/// Prepends `hdr` to `pdu`.
#[must_use]
pub fn encode_adu(hdr: &Header, pdu: &[u8]) -> Bytes {
    debug_assert_eq!(hdr.pdu_len(), pdu.len());
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + pdu.len());
    buf.put_slice(&encode_header(hdr));
    buf.put_slice(pdu);
    buf.freeze()
}

/// Builds a request ADU for `pdu` with a transaction id drawn from `rng`.
///
/// # Errors
///
/// Fails with [`Error::InvalidParameter`] if the PDU is too large.
pub fn assemble<R>(rng: &mut R, unit_id: UnitId, pdu: &[u8]) -> Result<Bytes, Error>
where
    R: RngCore + ?Sized,
{
    let hdr = Header::random(rng, unit_id, pdu.len())?;
    Ok(encode_adu(&hdr, pdu))
}

/// Splits an ADU into its header and the remaining PDU bytes.
///
/// The length field is not checked against the PDU.
///
/// # Errors
///
/// Fails with [`Error::TruncatedAdu`] if `adu` is shorter than a header.
pub fn split(mut adu: Bytes) -> Result<(Header, Bytes), Error> {
    if adu.len() < HEADER_SIZE {
        return Err(Error::TruncatedAdu { len: adu.len() });
    }
    let pdu = adu.split_off(HEADER_SIZE);
    let hdr = decode_header(&adu)?;
    Ok((hdr, pdu))
}

#[cfg(feature = "tcp")]
pub use self::framed::ClientCodec;

#[cfg(feature = "tcp")]
mod framed {
    use std::io::{Error, ErrorKind, Result};

    use byteorder::{BigEndian, ByteOrder as _};
    use tokio_util::codec::{Decoder, Encoder};

    use crate::{
        bytes::{BufMut as _, Bytes, BytesMut},
        frame::{tcp::HEADER_SIZE, MAX_PDU_SIZE},
    };

    /// Cuts complete ADUs out of a byte stream.
    ///
    /// Decoded items are raw ADUs including the header. Validation is left
    /// to the caller.
    #[derive(Debug, Default)]
    pub struct ClientCodec {
        _private: (),
    }

    impl Decoder for ClientCodec {
        type Item = Bytes;
        type Error = Error;

        fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
            if buf.len() < HEADER_SIZE {
                return Ok(None);
            }

            // len = bytes of PDU + one byte (unit ID)
            let len = usize::from(BigEndian::read_u16(&buf[4..6]));
            if len == 0 || len > MAX_PDU_SIZE + 1 {
                log::warn!("Invalid length field in received header: {len}");
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid length field: {len}"),
                ));
            }

            let adu_len = HEADER_SIZE - 1 + len;
            if buf.len() < adu_len {
                buf.reserve(adu_len - buf.len());
                return Ok(None);
            }

            Ok(Some(buf.split_to(adu_len).freeze()))
        }
    }

    impl Encoder<Bytes> for ClientCodec {
        type Error = Error;

        fn encode(&mut self, adu: Bytes, buf: &mut BytesMut) -> Result<()> {
            buf.reserve(adu.len());
            buf.put_slice(&adu);
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::{codec::encode_request_pdu, frame::Request};

    #[test]
    fn encode_read_request_header() {
        // Read coils, starting from coil 100 for the length of 3 coils.
        let hdr = Header::new(8, 1, 5).unwrap();
        let pdu = encode_request_pdu(&Request::ReadCoils(100, 3)).unwrap();
        let adu = encode_adu(&hdr, &pdu);
        assert_eq!(
            &adu[..],
            b"\x00\x08\x00\x00\x00\x06\x01\x01\x00d\x00\x03"
        );
        assert_eq!(adu.len(), 12);
    }

    #[test]
    fn encode_decode_header() {
        let hdr = Header::new(0xABCD, 0xFF, 252).unwrap();
        let bytes = encode_header(&hdr);
        assert_eq!(bytes, [0xAB, 0xCD, 0x00, 0x00, 0x00, 0xFD, 0xFF]);
        assert_eq!(decode_header(&bytes).unwrap(), hdr);
    }

    #[test]
    fn decode_header_fragment() {
        assert!(matches!(
            decode_header(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06]),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn assemble_with_deterministic_transaction_ids() {
        let mut rng = StepRng::new(7, 1);
        let pdu = [0x03, 0x00, 0x00, 0x00, 0x0A];
        let first = assemble(&mut rng, 1, &pdu).unwrap();
        let second = assemble(&mut rng, 1, &pdu).unwrap();
        assert_eq!(&first[..2], &[0x00, 0x07]);
        assert_eq!(&second[..2], &[0x00, 0x08]);
        assert_eq!(&first[2..], &second[2..]);
        assert_eq!(&first[7..], &pdu);
    }

    #[test]
    fn split_assembled_adu() {
        let mut rng = StepRng::new(0x1234, 0);
        let pdu = [0x01, 0x00, 0x00, 0x00, 0x0A];
        let adu = assemble(&mut rng, 0x11, &pdu).unwrap();
        let (hdr, rsp_pdu) = split(adu).unwrap();
        assert_eq!(
            hdr,
            Header {
                transaction_id: 0x1234,
                protocol_id: 0,
                length: 6,
                unit_id: 0x11,
            }
        );
        assert_eq!(&rsp_pdu[..], &pdu);
    }

    #[test]
    fn split_truncated_adu() {
        for len in 0..HEADER_SIZE {
            let adu = Bytes::from(vec![0; len]);
            assert!(matches!(split(adu), Err(Error::TruncatedAdu { len: l }) if l == len));
        }
        let (hdr, pdu) = split(Bytes::from(vec![0; HEADER_SIZE])).unwrap();
        assert_eq!(hdr.length, 0);
        assert!(pdu.is_empty());
    }
}
