// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol data units, function codes and protocol limits.

pub mod tcp;

use std::{
    borrow::Cow,
    convert::TryFrom,
    error,
    fmt::{self, Display},
};

use crate::Error;

/// Bit that is set in the function code of an exception response.
pub const EXCEPTION_BIT: u8 = 0x80;

/// Maximum request/response PDU size.
///
/// As defined by the protocol for TCP.
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum number of coils or discrete inputs per read request.
pub const MAX_READ_BITS: Quantity = 2000;

/// Maximum number of registers per read request.
pub const MAX_READ_REGISTERS: Quantity = 125;

/// Maximum number of coils per write request.
pub const MAX_WRITE_COILS: Quantity = 1968;

/// Maximum number of registers per write request.
pub const MAX_WRITE_REGISTERS: Quantity = 123;

/// A supported Modbus function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 01 (0x01) Read Coils.
    ReadCoils,

    /// 02 (0x02) Read Discrete Inputs
    ReadDiscreteInputs,

    /// 03 (0x03) Read Holding Registers
    ReadHoldingRegisters,

    /// 04 (0x04) Read Input Registers
    ReadInputRegisters,

    /// 05 (0x05) Write Single Coil
    WriteSingleCoil,

    /// 06 (0x06) Write Single Register
    WriteSingleRegister,

    /// 15 (0x0F) Write Multiple Coils
    WriteMultipleCoils,

    /// 16 (0x10) Write Multiple Registers
    WriteMultipleRegisters,
}

/// The frame layout shared by a group of function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduShape {
    /// Coils and discrete inputs: address and quantity in, packed bits out.
    SingleBitRead,
    /// Registers: address and quantity in, words out.
    MultiBitRead,
    /// One coil or register, echoed verbatim.
    SingleWrite,
    /// A range of coils or registers, answered with address and quantity.
    MultiWrite,
}

impl FunctionCode {
    /// Gets the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
        }
    }

    /// The [`PduShape`] of requests and responses with this code.
    #[must_use]
    pub const fn shape(self) -> PduShape {
        match self {
            Self::ReadCoils | Self::ReadDiscreteInputs => PduShape::SingleBitRead,
            Self::ReadHoldingRegisters | Self::ReadInputRegisters => PduShape::MultiBitRead,
            Self::WriteSingleCoil | Self::WriteSingleRegister => PduShape::SingleWrite,
            Self::WriteMultipleCoils | Self::WriteMultipleRegisters => PduShape::MultiWrite,
        }
    }

    /// Checks if `value` is the function code of an exception response.
    #[must_use]
    pub const fn is_exception(value: u8) -> bool {
        value & EXCEPTION_BIT != 0
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            code => return Err(Error::UnsupportedFunctionCode(code)),
        };
        Ok(code)
    }
}

impl From<FunctionCode> for u8 {
    fn from(from: FunctionCode) -> Self {
        from.value()
    }
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// 0-based protocol address of a coil or register.
pub type Address = u16;

/// Single bit value. Written as `0xFF00` (on) or `0x0000` (off).
pub type Coil = bool;

/// Register value, big-endian on the wire.
pub type Word = u16;

/// Number of coils or registers.
pub type Quantity = u16;

/// A request PDU of one of the supported function codes.
///
/// Every variant starts with the (starting) address. Read requests carry
/// the number of items to read, write requests the value(s) to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// 0x01
    ReadCoils(Address, Quantity),
    /// 0x02
    ReadDiscreteInputs(Address, Quantity),
    /// 0x03
    ReadHoldingRegisters(Address, Quantity),
    /// 0x04
    ReadInputRegisters(Address, Quantity),
    /// 0x05
    WriteSingleCoil(Address, Coil),
    /// 0x06
    WriteSingleRegister(Address, Word),
    /// 0x0F, at most [`MAX_WRITE_COILS`] values
    WriteMultipleCoils(Address, Cow<'a, [Coil]>),
    /// 0x10, at most [`MAX_WRITE_REGISTERS`] values
    WriteMultipleRegisters(Address, Cow<'a, [Word]>),
}

impl Request<'_> {
    /// Detaches the request from borrowed write values.
    #[must_use]
    pub fn into_owned(self) -> Request<'static> {
        use Request::*;

        match self {
            ReadCoils(addr, qty) => ReadCoils(addr, qty),
            ReadDiscreteInputs(addr, qty) => ReadDiscreteInputs(addr, qty),
            ReadHoldingRegisters(addr, qty) => ReadHoldingRegisters(addr, qty),
            ReadInputRegisters(addr, qty) => ReadInputRegisters(addr, qty),
            WriteSingleCoil(addr, coil) => WriteSingleCoil(addr, coil),
            WriteSingleRegister(addr, word) => WriteSingleRegister(addr, word),
            WriteMultipleCoils(addr, coils) => {
                WriteMultipleCoils(addr, Cow::Owned(coils.into_owned()))
            }
            WriteMultipleRegisters(addr, words) => {
                WriteMultipleRegisters(addr, Cow::Owned(words.into_owned()))
            }
        }
    }

    /// Get the [`FunctionCode`] of the [`Request`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        use Request::*;

        match self {
            ReadCoils(_, _) => FunctionCode::ReadCoils,
            ReadDiscreteInputs(_, _) => FunctionCode::ReadDiscreteInputs,

            ReadHoldingRegisters(_, _) => FunctionCode::ReadHoldingRegisters,
            ReadInputRegisters(_, _) => FunctionCode::ReadInputRegisters,

            WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,

            WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// The (starting) address of the request.
    #[must_use]
    pub fn address(&self) -> Address {
        use Request::*;

        match self {
            ReadCoils(addr, _)
            | ReadDiscreteInputs(addr, _)
            | ReadHoldingRegisters(addr, _)
            | ReadInputRegisters(addr, _)
            | WriteSingleCoil(addr, _)
            | WriteSingleRegister(addr, _)
            | WriteMultipleCoils(addr, _)
            | WriteMultipleRegisters(addr, _) => *addr,
        }
    }

    /// The number of coils or registers addressed by the request.
    ///
    /// Counts beyond [`Quantity::MAX`] saturate and are rejected by
    /// [`Request::validate()`].
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        use Request::*;

        match self {
            ReadCoils(_, qty)
            | ReadDiscreteInputs(_, qty)
            | ReadHoldingRegisters(_, qty)
            | ReadInputRegisters(_, qty) => *qty,
            WriteSingleCoil(_, _) | WriteSingleRegister(_, _) => 1,
            WriteMultipleCoils(_, coils) => saturating_quantity(coils.len()),
            WriteMultipleRegisters(_, words) => saturating_quantity(words.len()),
        }
    }

    /// Checks that the quantity and the addressed range are within the
    /// protocol limits of the function code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the violated limit.
    pub fn validate(&self) -> Result<(), Error> {
        use Request::*;

        let max = match self {
            ReadCoils(_, _) | ReadDiscreteInputs(_, _) => MAX_READ_BITS,
            ReadHoldingRegisters(_, _) | ReadInputRegisters(_, _) => MAX_READ_REGISTERS,
            WriteSingleCoil(_, _) | WriteSingleRegister(_, _) => 1,
            WriteMultipleCoils(_, _) => MAX_WRITE_COILS,
            WriteMultipleRegisters(_, _) => MAX_WRITE_REGISTERS,
        };
        let quantity = self.quantity();
        if quantity == 0 || quantity > max {
            return Err(Error::invalid_parameter(format!(
                "quantity of function {} must be within 1..={max}, got {quantity}",
                self.function_code()
            )));
        }
        let end = u32::from(self.address()) + u32::from(quantity);
        if end > 0x1_0000 {
            return Err(Error::invalid_parameter(format!(
                "address range 0x{:04X} + {quantity} exceeds 0xFFFF",
                self.address()
            )));
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn saturating_quantity(len: usize) -> Quantity {
    if len > Quantity::MAX.into() {
        Quantity::MAX
    } else {
        len as Quantity
    }
}

/// The decoded PDU of a successful response.
///
/// Read responses hold exactly the requested number of values; padding
/// bits of packed coils are dropped. Single writes echo address and value,
/// multiple writes echo starting address and quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadCoils(Vec<Coil>),
    ReadDiscreteInputs(Vec<Coil>),
    ReadHoldingRegisters(Vec<Word>),
    ReadInputRegisters(Vec<Word>),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Quantity),
    WriteMultipleRegisters(Address, Quantity),
}

impl Response {
    /// Get the [`FunctionCode`] of the [`Response`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        use Response::*;

        match self {
            ReadCoils(_) => FunctionCode::ReadCoils,
            ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,

            ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,

            WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,

            WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// 0x01
    IllegalFunction,
    /// 0x02
    IllegalDataAddress,
    /// 0x03
    IllegalDataValue,
    /// 0x04
    ServerDeviceFailure,
    /// 0x05
    Acknowledge,
    /// 0x06
    ServerDeviceBusy,
    /// 0x08
    MemoryParityError,
    /// 0x0A
    GatewayPathUnavailable,
    /// 0x0B
    GatewayTargetDevice,
    /// None of the above.
    ///
    /// Prefer [`Self::new()`] over constructing this variant with one of
    /// the predefined values.
    Custom(u8),
}

impl From<ExceptionCode> for u8 {
    fn from(from: ExceptionCode) -> Self {
        use crate::frame::ExceptionCode::*;
        match from {
            IllegalFunction => 0x01,
            IllegalDataAddress => 0x02,
            IllegalDataValue => 0x03,
            ServerDeviceFailure => 0x04,
            Acknowledge => 0x05,
            ServerDeviceBusy => 0x06,
            MemoryParityError => 0x08,
            GatewayPathUnavailable => 0x0A,
            GatewayTargetDevice => 0x0B,
            Custom(code) => code,
        }
    }
}

impl ExceptionCode {
    /// Create a new [`ExceptionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use crate::frame::ExceptionCode::*;

        match value {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            other => Custom(other),
        }
    }

    pub(crate) fn description(&self) -> &str {
        use crate::frame::ExceptionCode::*;

        match *self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            MemoryParityError => "Memory parity error",
            GatewayPathUnavailable => "Gateway path unavailable",
            GatewayTargetDevice => "Gateway target device failed to respond",
            Custom(_) => "Custom",
        }
    }
}

/// A server (slave) exception response.
///
/// `function` is the function code of the failed request, i.e. the
/// received function code with [`EXCEPTION_BIT`] cleared. It is kept as
/// a raw byte because servers may report exceptions for any code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: u8,
    pub exception: ExceptionCode,
}

impl ExceptionResponse {
    /// The [`FunctionCode`] of the failed request, if it is supported.
    #[must_use]
    pub fn function_code(&self) -> Option<FunctionCode> {
        FunctionCode::try_from(self.function).ok()
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl error::Error for ExceptionCode {
    fn description(&self) -> &str {
        self.description()
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {
    fn description(&self) -> &str {
        self.exception.description()
    }
}
