// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP clients
//!
//! [`AduBuilder`] and [`parse_response_adu()`] work on plain byte buffers
//! and leave the transport to the caller. The asynchronous [`Context`]
//! drives a request/response exchange over any duplex byte stream.

use std::{borrow::Cow, fmt::Debug, io};

use async_trait::async_trait;
use rand::{rngs::StdRng, RngCore, SeedableRng as _};

use crate::{
    bytes::Bytes,
    codec::{self, tcp::assemble},
    frame::*,
    slave::*,
    verify, Error, Result,
};

#[cfg(feature = "tcp")]
pub mod tcp;

/// Builds ready-to-send request ADUs.
///
/// Every ADU gets a fresh transaction id drawn from the random number
/// generator `R`. Inject a deterministic generator to get reproducible ids.
#[derive(Debug, Clone)]
pub struct AduBuilder<R = StdRng> {
    rng: R,
}

impl AduBuilder<StdRng> {
    /// Creates a builder with a generator seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for AduBuilder<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> AduBuilder<R> {
    /// Creates a builder that draws transaction ids from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Builds the ADU of an arbitrary request.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidParameter`] if the request exceeds the
    /// protocol limits.
    pub fn build(&mut self, slave: Slave, request: &Request<'_>) -> std::result::Result<Bytes, Error> {
        let pdu = codec::encode_request_pdu(request)?;
        assemble(&mut self.rng, slave.into(), &pdu)
    }

    /// Read multiple coils (0x01)
    pub fn read_coils(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::ReadCoils(addr, cnt))
    }

    /// Read multiple discrete inputs (0x02)
    pub fn read_discrete_inputs(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::ReadDiscreteInputs(addr, cnt))
    }

    /// Read multiple holding registers (0x03)
    pub fn read_holding_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::ReadHoldingRegisters(addr, cnt))
    }

    /// Read multiple input registers (0x04)
    pub fn read_input_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        cnt: Quantity,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::ReadInputRegisters(addr, cnt))
    }

    /// Write a single coil (0x05)
    pub fn write_single_coil(
        &mut self,
        slave: Slave,
        addr: Address,
        coil: Coil,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::WriteSingleCoil(addr, coil))
    }

    /// Write a single holding register (0x06)
    pub fn write_single_register(
        &mut self,
        slave: Slave,
        addr: Address,
        word: Word,
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::WriteSingleRegister(addr, word))
    }

    /// Write multiple coils (0x0F)
    pub fn write_multiple_coils(
        &mut self,
        slave: Slave,
        addr: Address,
        coils: &[Coil],
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::WriteMultipleCoils(addr, Cow::Borrowed(coils)))
    }

    /// Write multiple holding registers (0x10)
    pub fn write_multiple_registers(
        &mut self,
        slave: Slave,
        addr: Address,
        words: &[Word],
    ) -> std::result::Result<Bytes, Error> {
        self.build(slave, &Request::WriteMultipleRegisters(addr, Cow::Borrowed(words)))
    }
}

/// Validates `response_adu` against `request_adu` and decodes it.
///
/// The request ADU provides the context for decoding, e.g. the quantity
/// that read responses are truncated to.
///
/// # Errors
///
/// See [`verify::verify_response()`].
pub fn parse_response_adu(request_adu: &[u8], response_adu: &[u8]) -> Result<Response> {
    verify::check_response(
        Bytes::copy_from_slice(request_adu),
        Bytes::copy_from_slice(response_adu),
    )
}

/// Transport independent asynchronous client trait
#[async_trait]
pub trait Client: SlaveContext + Send + Debug {
    /// Invokes a _Modbus_ function.
    async fn call(&mut self, request: Request<'_>) -> Result<Response>;

    /// Disconnects the client.
    ///
    /// Shuts down the underlying stream gracefully. Dropping the client
    /// without disconnecting it also frees all resources.
    async fn disconnect(&mut self) -> io::Result<()>;
}

/// Asynchronous _Modbus_ reader
#[async_trait]
pub trait Reader: Client {
    /// Read multiple coils (0x01)
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple discrete inputs (0x02)
    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple holding registers (0x03)
    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read multiple input registers (0x04)
    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
}

/// Asynchronous Modbus writer
#[async_trait]
pub trait Writer: Client {
    /// Write a single coil (0x05)
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write a single holding register (0x06)
    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple coils (0x0F)
    async fn write_multiple_coils(&mut self, addr: Address, coils: &'_ [Coil]) -> Result<()>;

    /// Write multiple holding registers (0x10)
    async fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

/// Asynchronous Modbus client context
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(val: Context) -> Self {
        val.client
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.client.call(request).await
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.client.disconnect().await
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

#[async_trait]
impl Reader for Context {
    async fn read_coils<'a>(&'a mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        self.client
            .call(Request::ReadCoils(addr, cnt))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::ReadCoils(coils) => {
                        debug_assert_eq!(coils.len(), cnt.into());
                        coils
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn read_discrete_inputs<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Coil>> {
        self.client
            .call(Request::ReadDiscreteInputs(addr, cnt))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::ReadDiscreteInputs(coils) => {
                        debug_assert_eq!(coils.len(), cnt.into());
                        coils
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn read_holding_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.client
            .call(Request::ReadHoldingRegisters(addr, cnt))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::ReadHoldingRegisters(words) => {
                        debug_assert_eq!(words.len(), cnt.into());
                        words
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn read_input_registers<'a>(
        &'a mut self,
        addr: Address,
        cnt: Quantity,
    ) -> Result<Vec<Word>> {
        self.client
            .call(Request::ReadInputRegisters(addr, cnt))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::ReadInputRegisters(words) => {
                        debug_assert_eq!(words.len(), cnt.into());
                        words
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }
}

#[async_trait]
impl Writer for Context {
    async fn write_single_coil<'a>(&'a mut self, addr: Address, coil: Coil) -> Result<()> {
        self.client
            .call(Request::WriteSingleCoil(addr, coil))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::WriteSingleCoil(rsp_addr, rsp_coil) => {
                        debug_assert_eq!(addr, rsp_addr);
                        debug_assert_eq!(coil, rsp_coil);
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn write_single_register<'a>(&'a mut self, addr: Address, word: Word) -> Result<()> {
        self.client
            .call(Request::WriteSingleRegister(addr, word))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::WriteSingleRegister(rsp_addr, rsp_word) => {
                        debug_assert_eq!(addr, rsp_addr);
                        debug_assert_eq!(word, rsp_word);
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn write_multiple_coils<'a>(&'a mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let cnt = coils.len();
        self.client
            .call(Request::WriteMultipleCoils(addr, Cow::Borrowed(coils)))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::WriteMultipleCoils(rsp_addr, rsp_cnt) => {
                        debug_assert_eq!(addr, rsp_addr);
                        debug_assert_eq!(cnt, rsp_cnt.into());
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }

    async fn write_multiple_registers<'a>(
        &'a mut self,
        addr: Address,
        words: &[Word],
    ) -> Result<()> {
        let cnt = words.len();
        self.client
            .call(Request::WriteMultipleRegisters(addr, Cow::Borrowed(words)))
            .await
            .map(|result| {
                result.map(|response| match response {
                    Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) => {
                        debug_assert_eq!(addr, rsp_addr);
                        debug_assert_eq!(cnt, rsp_cnt.into());
                    }
                    _ => unreachable!("call() should reject mismatching responses"),
                })
            })
    }
}
