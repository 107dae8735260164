// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoding and decoding of request and response PDUs.

use std::{
    convert::TryFrom,
    io::{self, BufRead as _, Cursor, Error as IoError, ErrorKind},
};

use byteorder::{BigEndian, ReadBytesExt as _};

use crate::{
    bytes::{Buf as _, BufMut as _, Bytes, BytesMut},
    frame::{Coil, FunctionCode, Quantity, Request, Response, EXCEPTION_BIT},
    verify, Error, ExceptionCode, ExceptionResponse,
};

pub mod tcp;

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // Quantities are validated against the protocol limits before encoding.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    // Byte counts are validated against the protocol limits before encoding.
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

/// Encodes a request PDU.
///
/// # Errors
///
/// Fails with [`Error::InvalidParameter`] if the quantity or the addressed
/// range of the request exceeds the protocol limits. No bytes are built in
/// that case.
pub fn encode_request_pdu(request: &Request<'_>) -> Result<Bytes, Error> {
    request.validate()?;
    let mut buf = BytesMut::with_capacity(request_pdu_size(request));
    write_request_pdu(&mut buf, request);
    Ok(buf.freeze())
}

fn write_request_pdu(buf: &mut BytesMut, request: &Request<'_>) {
    use crate::frame::Request::*;
    buf.put_u8(request.function_code().value());
    match request {
        ReadCoils(address, quantity)
        | ReadDiscreteInputs(address, quantity)
        | ReadInputRegisters(address, quantity)
        | ReadHoldingRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleCoils(address, coils) => {
            buf.put_u16(*address);
            buf.put_u16(u16_len(coils.len()));
            buf.put_u8(u8_len(packed_coils_size(coils)));
            encode_packed_coils(buf, coils);
        }
        WriteMultipleRegisters(address, words) => {
            buf.put_u16(*address);
            let len = words.len();
            buf.put_u16(u16_len(len));
            buf.put_u8(u8_len(len * 2));
            for w in words.as_ref() {
                buf.put_u16(*w);
            }
        }
    }
}

fn request_pdu_size(request: &Request<'_>) -> usize {
    use crate::frame::Request::*;
    match request {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _)
        | WriteSingleRegister(_, _)
        | WriteSingleCoil(_, _) => 5,
        WriteMultipleCoils(_, coils) => 6 + packed_coils_size(coils),
        WriteMultipleRegisters(_, words) => 6 + words.len() * 2,
    }
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

impl TryFrom<Bytes> for Request<'static> {
    type Error = Error;

    /// Decodes a request PDU, e.g. to recover the context of an already
    /// assembled request ADU.
    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let Some(&fn_code) = bytes.first() else {
            return Err(Error::invalid_parameter("empty request PDU"));
        };
        let fn_code = FunctionCode::try_from(fn_code)?;
        let req = decode_request_pdu(fn_code, &bytes)
            .map_err(|err| Error::invalid_parameter(format!("malformed request PDU: {err}")))?;
        req.validate()?;
        Ok(req)
    }
}

fn decode_request_pdu(fn_code: FunctionCode, bytes: &Bytes) -> io::Result<Request<'static>> {
    use crate::frame::Request::*;
    let rdr = &mut Cursor::new(bytes);
    rdr.consume(1);
    let req = match fn_code {
        FunctionCode::ReadCoils => ReadCoils(read_u16_be(rdr)?, read_u16_be(rdr)?),
        FunctionCode::ReadDiscreteInputs => ReadDiscreteInputs(read_u16_be(rdr)?, read_u16_be(rdr)?),
        FunctionCode::ReadHoldingRegisters => {
            ReadHoldingRegisters(read_u16_be(rdr)?, read_u16_be(rdr)?)
        }
        FunctionCode::ReadInputRegisters => ReadInputRegisters(read_u16_be(rdr)?, read_u16_be(rdr)?),
        FunctionCode::WriteSingleCoil => {
            let address = read_u16_be(rdr)?;
            let value = read_u16_be(rdr)?;
            let state = coil_to_bool(value).ok_or_else(|| {
                IoError::new(
                    ErrorKind::InvalidData,
                    format!("invalid coil value: 0x{value:04X}"),
                )
            })?;
            WriteSingleCoil(address, state)
        }
        FunctionCode::WriteSingleRegister => WriteSingleRegister(read_u16_be(rdr)?, read_u16_be(rdr)?),
        FunctionCode::WriteMultipleCoils => {
            let address = read_u16_be(rdr)?;
            let quantity = read_u16_be(rdr)?;
            let byte_count = usize::from(rdr.read_u8()?);
            if byte_count != packed_coils_len(quantity) {
                return Err(IoError::new(ErrorKind::InvalidData, "invalid byte count"));
            }
            if bytes.len() < 6 + byte_count {
                return Err(IoError::new(ErrorKind::InvalidData, "too short"));
            }
            rdr.consume(byte_count);
            let packed_coils = &bytes[6..6 + byte_count];
            WriteMultipleCoils(address, decode_packed_coils(packed_coils, quantity).into())
        }
        FunctionCode::WriteMultipleRegisters => {
            let address = read_u16_be(rdr)?;
            let quantity = read_u16_be(rdr)?;
            let byte_count = rdr.read_u8()?;
            if usize::from(byte_count) != usize::from(quantity) * 2 {
                return Err(IoError::new(ErrorKind::InvalidData, "invalid quantity"));
            }
            let mut data = Vec::with_capacity(quantity.into());
            for _ in 0..quantity {
                data.push(read_u16_be(rdr)?);
            }
            WriteMultipleRegisters(address, data.into())
        }
    };
    // Verify that all data has been consumed and decoded.
    if rdr.has_remaining() {
        return Err(IoError::new(ErrorKind::InvalidData, "undecoded request data"));
    }
    Ok(req)
}

/// Decodes the response PDU that answers `request`.
///
/// A PDU with [`EXCEPTION_BIT`] set in its function code always decodes as
/// an [`ExceptionResponse`], returned as the inner `Err`.
///
/// # Errors
///
/// - [`Error::HeaderMismatch`] if the function code differs from the request.
/// - [`Error::ByteCountMismatch`] if a read response does not carry exactly
///   the requested quantity.
/// - [`Error::EchoMismatch`] if a write response does not echo the request.
/// - [`Error::MalformedResponse`] for missing, superfluous or invalid bytes.
pub fn decode_response_pdu(request: &Request<'_>, bytes: Bytes) -> crate::Result<Response> {
    let Some(&fn_code) = bytes.first() else {
        return Err(Error::malformed_response("empty response PDU"));
    };
    if FunctionCode::is_exception(fn_code) {
        return ExceptionResponse::try_from(bytes).map(Err);
    }
    verify::verify_function_code(request, fn_code)?;
    let rsp = decode_response(request, &bytes)?;
    verify::verify_echo(request, &rsp)?;
    Ok(Ok(rsp))
}

fn too_short(_: IoError) -> Error {
    Error::malformed_response("too short")
}

fn decode_response(request: &Request<'_>, bytes: &Bytes) -> Result<Response, Error> {
    use crate::frame::Request::*;
    let rdr = &mut Cursor::new(bytes);
    rdr.consume(1);
    let rsp = match request {
        ReadCoils(_, quantity) | ReadDiscreteInputs(_, quantity) => {
            let byte_count = rdr.read_u8().map_err(too_short)?;
            verify::verify_byte_count(request, byte_count)?;
            let byte_count = usize::from(byte_count);
            if bytes.len() < 2 + byte_count {
                return Err(Error::malformed_response("too short"));
            }
            rdr.consume(byte_count);
            let coils = decode_packed_coils(&bytes[2..2 + byte_count], *quantity);
            if matches!(request, ReadCoils(_, _)) {
                Response::ReadCoils(coils)
            } else {
                Response::ReadDiscreteInputs(coils)
            }
        }
        ReadHoldingRegisters(_, _) | ReadInputRegisters(_, _) => {
            let byte_count = rdr.read_u8().map_err(too_short)?;
            if byte_count % 2 != 0 {
                return Err(Error::malformed_response(format!(
                    "odd byte count: {byte_count}"
                )));
            }
            verify::verify_byte_count(request, byte_count)?;
            let quantity = byte_count / 2;
            let mut data = Vec::with_capacity(quantity.into());
            for _ in 0..quantity {
                data.push(read_u16_be(rdr).map_err(too_short)?);
            }
            if matches!(request, ReadHoldingRegisters(_, _)) {
                Response::ReadHoldingRegisters(data)
            } else {
                Response::ReadInputRegisters(data)
            }
        }
        WriteSingleCoil(_, state) => {
            let address = read_u16_be(rdr).map_err(too_short)?;
            let value = read_u16_be(rdr).map_err(too_short)?;
            let rsp_state = coil_to_bool(value).ok_or(Error::EchoMismatch {
                field: "value",
                request: bool_to_coil(*state),
                response: value,
            })?;
            Response::WriteSingleCoil(address, rsp_state)
        }
        WriteSingleRegister(_, _) => Response::WriteSingleRegister(
            read_u16_be(rdr).map_err(too_short)?,
            read_u16_be(rdr).map_err(too_short)?,
        ),
        WriteMultipleCoils(_, _) => Response::WriteMultipleCoils(
            read_u16_be(rdr).map_err(too_short)?,
            read_u16_be(rdr).map_err(too_short)?,
        ),
        WriteMultipleRegisters(_, _) => Response::WriteMultipleRegisters(
            read_u16_be(rdr).map_err(too_short)?,
            read_u16_be(rdr).map_err(too_short)?,
        ),
    };
    // Verify that all data has been consumed and decoded.
    if rdr.has_remaining() {
        return Err(Error::malformed_response("undecoded response data"));
    }
    Ok(rsp)
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let mut rdr = Cursor::new(&bytes);
        let fn_err_code = rdr.read_u8().map_err(too_short)?;
        if !FunctionCode::is_exception(fn_err_code) {
            return Err(Error::malformed_response(format!(
                "invalid exception function code: 0x{fn_err_code:02X}"
            )));
        }
        let exception = ExceptionCode::new(rdr.read_u8().map_err(too_short)?);
        if rdr.has_remaining() {
            return Err(Error::malformed_response("undecoded exception data"));
        }
        Ok(ExceptionResponse {
            function: fn_err_code & !EXCEPTION_BIT,
            exception,
        })
    }
}

pub(crate) fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

fn coil_to_bool(coil: u16) -> Option<bool> {
    match coil {
        0xFF00 => Some(true),
        0x0000 => Some(false),
        _ => None,
    }
}

/// Number of bytes needed to pack `quantity` coils.
pub(crate) fn packed_coils_len(quantity: Quantity) -> usize {
    (usize::from(quantity) + 7) / 8
}

fn packed_coils_size(coils: &[Coil]) -> usize {
    (coils.len() + 7) / 8
}

/// Packs coils LSB-first, i.e. the first coil ends up in bit 0 of the
/// first byte. Unused high bits of the last byte stay zero.
fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils);
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

/// Unpacks the first `count` coils. `bytes` must hold at least
/// `packed_coils_len(count)` bytes.
fn decode_packed_coils(bytes: &[u8], count: Quantity) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0usize..count.into() {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

/// Encodes a response the way a server would. Only used to feed the
/// decoder in tests.
#[cfg(test)]
pub(crate) fn encode_response_pdu(rsp: &Response) -> Bytes {
    use crate::frame::Response::*;
    let mut buf = BytesMut::new();
    buf.put_u8(rsp.function_code().value());
    match rsp {
        ReadCoils(coils) | ReadDiscreteInputs(coils) => {
            buf.put_u8(u8_len(packed_coils_size(coils)));
            encode_packed_coils(&mut buf, coils);
        }
        ReadInputRegisters(registers) | ReadHoldingRegisters(registers) => {
            buf.put_u8(u8_len(registers.len() * 2));
            for r in registers {
                buf.put_u16(*r);
            }
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
        WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
    }
    buf.freeze()
}

#[cfg(test)]
pub(crate) fn encode_exception_response_pdu(rsp: ExceptionResponse) -> Bytes {
    debug_assert!(rsp.function < EXCEPTION_BIT);
    Bytes::from(vec![rsp.function | EXCEPTION_BIT, rsp.exception.into()])
}
