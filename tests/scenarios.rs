// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response exchanges on plain byte buffers.

use modbus_tcp_adu::{
    client::{parse_response_adu, AduBuilder},
    verify::verify_response,
    Error, ExceptionCode, ExceptionResponse, Response, Slave,
};
use rand::rngs::mock::StepRng;

fn builder() -> AduBuilder<StepRng> {
    AduBuilder::with_rng(StepRng::new(0x0102, 1))
}

/// Builds a response ADU that echoes the header of `req_adu`.
fn response_adu(req_adu: &[u8], pdu: &[u8]) -> Vec<u8> {
    let mut adu = req_adu[..4].to_vec();
    adu.extend_from_slice(&u16::try_from(pdu.len() + 1).unwrap().to_be_bytes());
    adu.push(req_adu[6]);
    adu.extend_from_slice(pdu);
    adu
}

#[test]
fn read_ten_coils() {
    let req_adu = builder().read_coils(Slave(1), 0, 10).unwrap();
    assert_eq!(
        &req_adu[..],
        &[0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x0A]
    );
    let rsp_adu = response_adu(&req_adu, &[0x01, 0x02, 0xAA, 0x02]);
    let rsp = parse_response_adu(&req_adu, &rsp_adu).unwrap().unwrap();
    // Coils are packed LSB first: 0xAA = 0b1010_1010, 0x02 = 0b0000_0010
    assert_eq!(
        rsp,
        Response::ReadCoils(vec![
            false, true, false, true, false, true, false, true, false, true
        ])
    );
}

#[test]
fn read_ten_holding_registers() {
    let req_adu = builder().read_holding_registers(Slave(1), 0, 10).unwrap();
    let mut pdu = vec![0x03, 20];
    for word in 0u16..10 {
        pdu.extend_from_slice(&word.to_be_bytes());
    }
    let rsp_adu = response_adu(&req_adu, &pdu);
    let rsp = parse_response_adu(&req_adu, &rsp_adu).unwrap().unwrap();
    assert_eq!(rsp, Response::ReadHoldingRegisters((0..10).collect()));
}

#[test]
fn read_holding_registers_with_short_byte_count() {
    let req_adu = builder().read_holding_registers(Slave(1), 0, 10).unwrap();
    let mut pdu = vec![0x03, 18];
    pdu.extend_from_slice(&[0; 18]);
    let rsp_adu = response_adu(&req_adu, &pdu);
    let err = verify_response(&req_adu, &rsp_adu).unwrap_err();
    assert!(matches!(
        err,
        Error::ByteCountMismatch {
            expected: 20,
            actual: 18
        }
    ));
}

#[test]
fn write_single_coil_echoes_request() {
    let req_adu = builder().write_single_coil(Slave(1), 1, false).unwrap();
    assert_eq!(&req_adu[7..], &[0x05, 0x00, 0x01, 0x00, 0x00]);
    verify_response(&req_adu, &req_adu).unwrap();
    let rsp = parse_response_adu(&req_adu, &req_adu).unwrap().unwrap();
    assert_eq!(rsp, Response::WriteSingleCoil(1, false));

    let mut rsp_adu = req_adu.to_vec();
    rsp_adu[10] = 0xFF;
    assert!(matches!(
        verify_response(&req_adu, &rsp_adu),
        Err(Error::EchoMismatch { .. })
    ));
}

#[test]
fn write_multiple_coils_ignores_values() {
    let req_adu = builder()
        .write_multiple_coils(Slave(1), 0, &[true, false])
        .unwrap();
    let rsp_adu = response_adu(&req_adu, &[0x0F, 0x00, 0x00, 0x00, 0x02]);
    let rsp = parse_response_adu(&req_adu, &rsp_adu).unwrap().unwrap();
    assert_eq!(rsp, Response::WriteMultipleCoils(0, 2));

    let rsp_adu = response_adu(&req_adu, &[0x0F, 0x00, 0x00, 0x00, 0x03]);
    assert!(matches!(
        verify_response(&req_adu, &rsp_adu),
        Err(Error::EchoMismatch {
            field: "quantity",
            ..
        })
    ));
}

#[test]
fn exception_response_is_not_an_error() {
    let req_adu = builder().read_input_registers(Slave(1), 0x100, 4).unwrap();
    let rsp_adu = response_adu(&req_adu, &[0x84, 0x02]);
    verify_response(&req_adu, &rsp_adu).unwrap();
    assert_eq!(
        parse_response_adu(&req_adu, &rsp_adu).unwrap(),
        Err(ExceptionResponse {
            function: 0x04,
            exception: ExceptionCode::IllegalDataAddress,
        })
    );
}

#[test]
fn mismatching_headers() {
    let req_adu = builder().read_coils(Slave(1), 0, 8).unwrap();
    let rsp_pdu = [0x01, 0x01, 0x00];

    let mut rsp_adu = response_adu(&req_adu, &rsp_pdu);
    rsp_adu[6] = 2;
    assert!(matches!(
        verify_response(&req_adu, &rsp_adu),
        Err(Error::HeaderMismatch {
            field: "unit id",
            request: 1,
            response: 2
        })
    ));

    let mut rsp_adu = response_adu(&req_adu, &rsp_pdu);
    rsp_adu[1] = 0x03;
    assert!(matches!(
        verify_response(&req_adu, &rsp_adu),
        Err(Error::HeaderMismatch {
            field: "transaction id",
            ..
        })
    ));

    let mut rsp_adu = response_adu(&req_adu, &rsp_pdu);
    rsp_adu[5] += 1;
    assert!(matches!(
        verify_response(&req_adu, &rsp_adu),
        Err(Error::LengthMismatch { .. })
    ));
}

#[test]
fn truncated_adus() {
    let req_adu = builder().read_coils(Slave(1), 0, 8).unwrap();
    for len in 0..7 {
        let err = verify_response(&req_adu, &req_adu[..len]).unwrap_err();
        assert!(matches!(err, Error::TruncatedAdu { len: l } if l == len));
        let err = verify_response(&req_adu[..len], &req_adu).unwrap_err();
        assert!(matches!(err, Error::TruncatedAdu { len: l } if l == len));
    }
}

#[test]
fn invalid_requests_are_rejected() {
    let mut builder = builder();
    assert!(matches!(
        builder.read_coils(Slave(1), 0, 2001),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        builder.read_input_registers(Slave(1), 0xFFFF, 2),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        builder.write_multiple_registers(Slave(1), 0, &[0; 124]),
        Err(Error::InvalidParameter(_))
    ));
    builder.read_coils(Slave(1), 0xFFFF, 1).unwrap();
}
