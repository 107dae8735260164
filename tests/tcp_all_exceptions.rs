// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execute this test only if `tcp` feature is selected.

#![cfg(feature = "tcp")]

mod exception;

use std::{net::SocketAddr, time::Duration};

use exception::{check_client_context, exceptions, serve};
use modbus_tcp_adu::client;
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn all_exceptions() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let socket_addr = listener.local_addr()?;

    tokio::select! {
        _ = serve(listener, exceptions) => unreachable!(),
        r = client_context(socket_addr) => r?,
    }

    Ok(())
}

async fn client_context(socket_addr: SocketAddr) -> anyhow::Result<()> {
    // Give the server some time for starting up
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stream = TcpStream::connect(socket_addr).await?;
    let ctx = client::tcp::attach_slave(stream, 1.into());

    check_client_context(ctx).await;
    Ok(())
}
