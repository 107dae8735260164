// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client side framing of [Modbus TCP](https://en.wikipedia.org/wiki/Modbus)
//! messages in pure [Rust](https://www.rust-lang.org).
//!
//! Modbus is based on a [master/slave](https://en.wikipedia.org/wiki/Master/slave_(technology))
//! model. The master is called *client* and the slave is called *server*
//! in this library.
//!
//! The crate builds request ADUs, i.e. an MBAP header followed by a request
//! PDU, and validates response ADUs against the requests they answer.
//! Supported are the function codes 0x01 to 0x06, 0x0F and 0x10.
//!
//! ## Building and parsing frames
//!
//! ```
//! use modbus_tcp_adu::{client::AduBuilder, Response, Slave};
//!
//! let mut builder = AduBuilder::new();
//! let request = builder.read_holding_registers(Slave(1), 0x10, 2).unwrap();
//!
//! // Pretend the server answered with the values 1 and 2.
//! let mut response = request[..4].to_vec();
//! response.extend_from_slice(&[0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x01, 0x00, 0x02]);
//!
//! let rsp = modbus_tcp_adu::client::parse_response_adu(&request, &response)
//!     .unwrap() // Transport and framing errors
//!     .unwrap(); // Modbus exception responses
//! assert_eq!(rsp, Response::ReadHoldingRegisters(vec![1, 2]));
//! ```
//!
//! ## Asynchronous client
//!
//! With the `tcp` feature a [`client::Context`] can be attached to any
//! stream that implements `AsyncRead` and `AsyncWrite`, e.g. a
//! `tokio::net::TcpStream`:
//!
//! ```no_run
//! # #[cfg(feature = "tcp")]
//! async fn read(stream: tokio::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
//!     use modbus_tcp_adu::prelude::*;
//!
//!     let mut ctx = tcp::attach_slave(stream, Slave(1));
//!     let words = ctx.read_input_registers(0x1000, 7).await??;
//!     println!("Response is '{words:?}'");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub use bytes;

pub mod client;
pub mod codec;
pub mod prelude;
pub mod slave;
pub mod verify;

mod error;
pub use self::error::Error;

pub mod frame;
pub use self::frame::{
    Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, PduShape, Quantity, Request,
    Response, Word,
};

pub use self::slave::{Slave, SlaveId};

/// Specialized [`std::result::Result`] type for _Modbus_ client calls.
///
/// The outer `Err` carries a transport, framing or validation [`Error`].
/// The inner `Err` carries an [`ExceptionResponse`] sent by the server.
pub type Result<T> = std::result::Result<std::result::Result<T, ExceptionResponse>, Error>;
