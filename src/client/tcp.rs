// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::{fmt, io};

use futures_util::{SinkExt as _, StreamExt as _};
use rand::{rngs::StdRng, SeedableRng as _};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt as _};
use tokio_util::codec::Framed;

use super::Context;
use crate::{
    codec::{self, tcp::ClientCodec},
    frame::{tcp::*, *},
    slave::*,
    verify::{verify_function_code, verify_response_header},
    Result,
};

/// Attach a new client context to a transport connection.
///
/// The context addresses the unit id reserved for directly connected
/// devices, i.e. [`Slave::tcp_device()`].
pub fn attach<T>(transport: T) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_slave(transport, Slave::tcp_device())
}

/// Attach a new client context to a transport connection.
///
/// Use this function when talking to a device behind a TCP/RTU gateway.
pub fn attach_slave<T>(transport: T, slave: Slave) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let client = Client::new(transport, slave);
    Context {
        client: Box::new(client),
    }
}

/// Modbus TCP client
#[derive(Debug)]
pub(crate) struct Client<T> {
    framed: Framed<T, ClientCodec>,
    unit_id: UnitId,
    rng: StdRng,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        Self::with_rng(transport, slave, StdRng::from_entropy())
    }

    pub(crate) fn with_rng(transport: T, slave: Slave, rng: StdRng) -> Self {
        let framed = Framed::new(transport, ClientCodec::default());
        let unit_id: UnitId = slave.into();
        Self {
            framed,
            unit_id,
            rng,
        }
    }

    pub(crate) async fn call(&mut self, req: Request<'_>) -> Result<Response> {
        log::debug!("Call {:?}", req);
        let req_pdu = codec::encode_request_pdu(&req)?;
        let req_hdr = Header::random(&mut self.rng, self.unit_id, req_pdu.len())?;
        let req_adu = codec::tcp::encode_adu(&req_hdr, &req_pdu);

        self.framed.read_buffer_mut().clear();

        self.framed.send(req_adu).await?;
        let rsp_adu = self
            .framed
            .next()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))??;

        let (rsp_hdr, rsp_pdu) = codec::tcp::split(rsp_adu)?;
        verify_response_header(&req_hdr, &rsp_hdr, rsp_pdu.len())?;
        if let Some(&fn_code) = rsp_pdu.first() {
            verify_function_code(&req, fn_code)?;
        }
        let rsp = codec::decode_response_pdu(&req, rsp_pdu)?;
        if let Err(exception) = &rsp {
            log::debug!("Exception response: {exception}");
        }
        Ok(rsp)
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.framed.get_mut().shutdown().await
    }
}

impl<T> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.unit_id = slave.into();
    }
}

#[async_trait::async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request<'_>) -> Result<Response> {
        Client::call(self, req).await
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        Client::disconnect(self).await
    }
}
