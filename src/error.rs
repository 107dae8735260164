// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

/// Error type for building, parsing and validating _Modbus_ frames.
///
/// Exception responses reported by the server are not errors. They are
/// returned as the inner `Err` of [`crate::Result`].
#[derive(Debug, Error)]
pub enum Error {
    /// An address, quantity or value is out of the protocol range.
    ///
    /// Requests are rejected before any bytes are built.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The function code is not one of the supported codes.
    #[error("unsupported function code: 0x{0:02X}")]
    UnsupportedFunctionCode(u8),

    /// The ADU is too short to contain a header.
    #[error("truncated ADU: {len} byte(s)")]
    TruncatedAdu { len: usize },

    /// The header could not be parsed.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The length field of the header does not match the number of bytes
    /// that follow it.
    #[error("length mismatch: header announces {announced} byte(s), {actual} byte(s) follow")]
    LengthMismatch { announced: u16, actual: usize },

    /// The response PDU could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The byte count of a read response does not match the requested quantity.
    #[error("byte count mismatch: expected {expected}, actual {actual}")]
    ByteCountMismatch { expected: usize, actual: usize },

    /// A header field or the function code of the response differs from the request.
    #[error("{field} mismatch: request = {request}, response = {response}")]
    HeaderMismatch {
        field: &'static str,
        request: u16,
        response: u16,
    },

    /// A write response does not echo the fields of its request.
    #[error("{field} not echoed: request = {request}, response = {response}")]
    EchoMismatch {
        field: &'static str,
        request: u16,
        response: u16,
    },

    /// The underlying byte channel failed.
    #[error(transparent)]
    Transport(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub(crate) fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
