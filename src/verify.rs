// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of responses against the requests they answer.
//!
//! Checks are applied in a fixed order and stop at the first violation:
//!
//! 1. both ADUs carry a complete header whose length field matches the
//!    number of bytes that follow,
//! 2. the response echoes protocol id, transaction id and unit id,
//! 3. the function code matches, or signals an exception for it,
//! 4. read responses carry exactly the requested number of bytes,
//! 5. single write responses repeat the request PDU,
//! 6. multiple write responses repeat starting address and quantity.
//!
//! The values written by a multiple write are not repeated by the server
//! and therefore never checked.

use std::convert::TryFrom;

use crate::{
    bytes::Bytes,
    codec::{self, bool_to_coil, packed_coils_len, tcp::split},
    frame::{tcp::Header, Request, Response, EXCEPTION_BIT},
    Error,
};

/// Validates `response_adu` against `request_adu`.
///
/// An exception response for the requested function passes the validation.
///
/// # Errors
///
/// Returns the error of the first check that fails.
pub fn verify_response(request_adu: &[u8], response_adu: &[u8]) -> Result<(), Error> {
    check_response(
        Bytes::copy_from_slice(request_adu),
        Bytes::copy_from_slice(response_adu),
    )
    .map(drop)
}

/// Validates a response ADU and decodes it on success.
pub(crate) fn check_response(request_adu: Bytes, response_adu: Bytes) -> crate::Result<Response> {
    let (req_hdr, req_pdu) = split(request_adu)?;
    verify_length(&req_hdr, req_pdu.len())?;
    let request = Request::try_from(req_pdu)?;
    let (rsp_hdr, rsp_pdu) = split(response_adu)?;
    verify_response_header(&req_hdr, &rsp_hdr, rsp_pdu.len())?;
    let Some(&fn_code) = rsp_pdu.first() else {
        return Err(Error::malformed_response("empty response PDU"));
    };
    verify_function_code(&request, fn_code)?;
    codec::decode_response_pdu(&request, rsp_pdu)
}

fn verify_length(hdr: &Header, pdu_len: usize) -> Result<(), Error> {
    if usize::from(hdr.length) != pdu_len + 1 {
        return Err(Error::LengthMismatch {
            announced: hdr.length,
            actual: pdu_len + 1,
        });
    }
    Ok(())
}

fn mismatch(field: &'static str, request: u16, response: u16) -> Result<(), Error> {
    if request != response {
        return Err(Error::HeaderMismatch {
            field,
            request,
            response,
        });
    }
    Ok(())
}

/// Check that `rsp_hdr` answers `req_hdr` and announces `rsp_pdu_len` bytes.
///
/// # Errors
///
/// [`Error::LengthMismatch`] or [`Error::HeaderMismatch`] naming the first
/// field that differs.
pub fn verify_response_header(
    req_hdr: &Header,
    rsp_hdr: &Header,
    rsp_pdu_len: usize,
) -> Result<(), Error> {
    verify_length(rsp_hdr, rsp_pdu_len)?;
    mismatch("protocol id", req_hdr.protocol_id, rsp_hdr.protocol_id)?;
    mismatch(
        "transaction id",
        req_hdr.transaction_id,
        rsp_hdr.transaction_id,
    )?;
    mismatch(
        "unit id",
        req_hdr.unit_id.into(),
        rsp_hdr.unit_id.into(),
    )
}

/// Accepts the function code of the request or its exception variant.
pub(crate) fn verify_function_code(request: &Request<'_>, fn_code: u8) -> Result<(), Error> {
    let expected = request.function_code().value();
    if fn_code == expected || fn_code == expected | EXCEPTION_BIT {
        return Ok(());
    }
    mismatch("function code", expected.into(), fn_code.into())
}

/// Checks the byte count field of a read response.
pub(crate) fn verify_byte_count(request: &Request<'_>, byte_count: u8) -> Result<(), Error> {
    use crate::frame::Request::*;
    let expected = match request {
        ReadCoils(_, quantity) | ReadDiscreteInputs(_, quantity) => packed_coils_len(*quantity),
        ReadHoldingRegisters(_, quantity) | ReadInputRegisters(_, quantity) => {
            usize::from(*quantity) * 2
        }
        _ => return Ok(()),
    };
    let actual = usize::from(byte_count);
    if expected != actual {
        return Err(Error::ByteCountMismatch { expected, actual });
    }
    Ok(())
}

fn echo(field: &'static str, request: u16, response: u16) -> Result<(), Error> {
    if request != response {
        return Err(Error::EchoMismatch {
            field,
            request,
            response,
        });
    }
    Ok(())
}

/// Checks that a write response repeats its request.
pub(crate) fn verify_echo(request: &Request<'_>, response: &Response) -> Result<(), Error> {
    match (request, response) {
        (Request::WriteSingleCoil(req_addr, req_coil), Response::WriteSingleCoil(addr, coil)) => {
            echo("address", *req_addr, *addr)?;
            echo("value", bool_to_coil(*req_coil), bool_to_coil(*coil))
        }
        (
            Request::WriteSingleRegister(req_addr, req_word),
            Response::WriteSingleRegister(addr, word),
        ) => {
            echo("address", *req_addr, *addr)?;
            echo("value", *req_word, *word)
        }
        (Request::WriteMultipleCoils(req_addr, _), Response::WriteMultipleCoils(addr, quantity))
        | (
            Request::WriteMultipleRegisters(req_addr, _),
            Response::WriteMultipleRegisters(addr, quantity),
        ) => {
            echo("address", *req_addr, *addr)?;
            echo("quantity", request.quantity(), *quantity)
        }
        _ => Ok(()),
    }
}
