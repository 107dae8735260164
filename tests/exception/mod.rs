// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::TryFrom as _;

use modbus_tcp_adu::{
    bytes::Bytes,
    client::{Context, Reader as _, Writer as _},
    codec::tcp::{decode_header, encode_adu},
    frame::tcp::{Header, HEADER_SIZE},
    ExceptionCode, ExceptionResponse, Request, Response,
};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
};

/// Answers every request with an exception.
pub fn exceptions(req: Request<'static>) -> Result<Response, ExceptionCode> {
    use Request::*;

    match req {
        ReadCoils(_, _) => Err(ExceptionCode::Acknowledge),
        ReadDiscreteInputs(_, _) => Err(ExceptionCode::GatewayPathUnavailable),
        WriteSingleCoil(_, _) => Err(ExceptionCode::GatewayTargetDevice),
        WriteMultipleCoils(_, _) => Err(ExceptionCode::IllegalDataAddress),
        ReadInputRegisters(_, _) => Err(ExceptionCode::IllegalDataValue),
        ReadHoldingRegisters(_, _) => Err(ExceptionCode::IllegalFunction),
        WriteSingleRegister(_, _) => Err(ExceptionCode::MemoryParityError),
        WriteMultipleRegisters(_, _) => Err(ExceptionCode::ServerDeviceBusy),
    }
}

/// Accepts connections and answers requests with `handle` until an I/O
/// error occurs.
pub async fn serve<F>(listener: TcpListener, handle: F) -> anyhow::Result<()>
where
    F: Fn(Request<'static>) -> Result<Response, ExceptionCode> + Clone + Send + 'static,
{
    loop {
        let (stream, socket_addr) = listener.accept().await?;
        println!("Accepted connection from {socket_addr}");
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = process(stream, handle).await {
                eprintln!("{err}");
            }
        });
    }
}

async fn process<F>(mut stream: TcpStream, handle: F) -> anyhow::Result<()>
where
    F: Fn(Request<'static>) -> Result<Response, ExceptionCode>,
{
    loop {
        let mut buf = [0; HEADER_SIZE];
        match stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        let req_hdr = decode_header(&buf)?;
        let mut req_pdu = vec![0; req_hdr.pdu_len()];
        stream.read_exact(&mut req_pdu).await?;
        let req = Request::try_from(Bytes::from(req_pdu))?;
        let fn_code = req.function_code().value();
        let rsp_pdu = match handle(req) {
            Ok(rsp) => encode_response_pdu(&rsp),
            Err(exception) => vec![fn_code | 0x80, exception.into()],
        };
        let rsp_hdr = Header::new(req_hdr.transaction_id, req_hdr.unit_id, rsp_pdu.len())?;
        stream.write_all(&encode_adu(&rsp_hdr, &rsp_pdu)).await?;
    }
}

fn encode_response_pdu(rsp: &Response) -> Vec<u8> {
    let mut pdu = vec![rsp.function_code().value()];
    match rsp {
        Response::ReadHoldingRegisters(words) | Response::ReadInputRegisters(words) => {
            pdu.push(u8::try_from(words.len() * 2).unwrap());
            for word in words {
                pdu.extend_from_slice(&word.to_be_bytes());
            }
        }
        Response::WriteSingleRegister(addr, word) => {
            pdu.extend_from_slice(&addr.to_be_bytes());
            pdu.extend_from_slice(&word.to_be_bytes());
        }
        Response::WriteMultipleRegisters(addr, cnt) => {
            pdu.extend_from_slice(&addr.to_be_bytes());
            pdu.extend_from_slice(&cnt.to_be_bytes());
        }
        _ => unimplemented!("not needed by the tests"),
    }
    pdu
}

fn is_exception(
    response: Result<impl std::fmt::Debug, ExceptionResponse>,
    exception: ExceptionCode,
) -> bool {
    matches!(response, Err(ExceptionResponse { exception: e, .. }) if e == exception)
}

pub async fn check_client_context(mut ctx: Context) {
    let response = ctx.read_coils(0x00, 2).await.unwrap();
    assert!(is_exception(response, ExceptionCode::Acknowledge));

    let response = ctx
        .read_discrete_inputs(0x00, 2)
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::GatewayPathUnavailable));

    let response = ctx
        .write_single_coil(0x00, true)
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::GatewayTargetDevice));

    let response = ctx
        .write_multiple_coils(0x00, &[true])
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::IllegalDataAddress));

    let response = ctx
        .read_input_registers(0x00, 2)
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::IllegalDataValue));

    let response = ctx
        .read_holding_registers(0x00, 2)
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::IllegalFunction));

    let response = ctx
        .write_single_register(0x00, 42)
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::MemoryParityError));

    let response = ctx
        .write_multiple_registers(0x00, &[42])
        .await
        .expect("communication failed");
    assert!(is_exception(response, ExceptionCode::ServerDeviceBusy));
}
