//! Request encoding and response decoding
//!
//! [`ModbusCodec`] covers the standard holding register functions the ABC
//! answers. [`AbcCodec`] adds the vendor function codes 65-68 and hands
//! every other function to the codec it wraps.

use std::fmt;

use tracing::debug;

use crate::constants::{
    EXCEPTION_FLAG, FC_DIAGNOSTIC, FC_READ_HOLDING_REGISTERS, FC_READ_RANGES, FC_READ_REGISTERS,
    FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    MAX_REGISTERS_PER_REQUEST,
};
use crate::error::{AbcError, Result};
use crate::pdu::{AbcPdu, PduBuilder};
use crate::planner::{Chunk, Span};

/// A single bus transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// FC03
    ReadHoldingRegisters { start: u16, count: u16 },
    /// FC06
    WriteSingleRegister { address: u16, value: u16 },
    /// FC16
    WriteMultipleRegisters { start: u16, values: Vec<u16> },
    /// FC65, (start, count) pairs
    ReadRanges(Vec<(u16, u16)>),
    /// FC66
    ReadRegisters(Vec<u16>),
    /// FC67, (address, value) pairs
    WriteRegisters(Vec<(u16, u16)>),
    /// FC68, both fields passed through untouched
    Diagnostic(u16, u16),
}

impl Request {
    /// Read request for a planned chunk: FC65 if it holds any range, FC66 otherwise
    pub fn for_spans(spans: &[Span]) -> Self {
        if spans.iter().any(Span::is_range) {
            Request::ReadRanges(
                spans
                    .iter()
                    .map(|span| (span.first(), span.len() as u16))
                    .collect(),
            )
        } else {
            Request::ReadRegisters(spans.iter().map(Span::first).collect())
        }
    }

    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self::for_spans(chunk.spans())
    }

    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Request::ReadRanges(_) => FC_READ_RANGES,
            Request::ReadRegisters(_) => FC_READ_REGISTERS,
            Request::WriteRegisters(_) => FC_WRITE_REGISTERS,
            Request::Diagnostic(..) => FC_DIAGNOSTIC,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::WriteSingleRegister { .. }
                | Request::WriteMultipleRegisters { .. }
                | Request::WriteRegisters(_)
        )
    }

    /// Addresses a read answers, in wire order
    pub fn read_addresses(&self) -> Vec<u16> {
        match self {
            Request::ReadHoldingRegisters { start, count } => {
                (0..*count).map(|i| start.wrapping_add(i)).collect()
            }
            Request::ReadRanges(pairs) => pairs
                .iter()
                .flat_map(|&(start, count)| (0..count).map(move |i| start.wrapping_add(i)))
                .collect(),
            Request::ReadRegisters(addrs) => addrs.clone(),
            _ => Vec::new(),
        }
    }

    /// Addresses a write touches
    pub fn written_addresses(&self) -> Vec<u16> {
        match self {
            Request::WriteSingleRegister { address, .. } => vec![*address],
            Request::WriteMultipleRegisters { start, values } => (0..values.len())
                .map(|i| start.wrapping_add(i as u16))
                .collect(),
            Request::WriteRegisters(pairs) => pairs.iter().map(|&(addr, _)| addr).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::ReadHoldingRegisters { start, count } => {
                write!(f, "FC03 read {} x{}", start, count)
            }
            Request::WriteSingleRegister { address, value } => {
                write!(f, "FC06 write {}={}", address, value)
            }
            Request::WriteMultipleRegisters { start, values } => {
                write!(f, "FC16 write {} x{}", start, values.len())
            }
            Request::ReadRanges(pairs) => write!(f, "FC65 read {} ranges", pairs.len()),
            Request::ReadRegisters(addrs) => write!(f, "FC66 read {} registers", addrs.len()),
            Request::WriteRegisters(pairs) => write!(f, "FC67 write {} registers", pairs.len()),
            Request::Diagnostic(a, b) => write!(f, "FC68 diagnostic {:04x} {:04x}", a, b),
        }
    }
}

/// Decoded response content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Register values in request order
    Registers(Vec<u16>),
    /// FC06 echo
    WriteSingle { address: u16, value: u16 },
    /// FC16 echo
    WriteMultiple { start: u16, count: u16 },
    /// FC67, no content
    WriteAck,
    /// FC68 status byte
    Diagnostic(u8),
}

/// Response body size following the function code, CRC excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Fixed(usize),
    /// One byte count, then that many bytes
    LengthPrefixed,
}

/// Explicit seam between the transaction driver and a function code dialect
pub trait PduCodec: Send + Sync + fmt::Debug {
    /// Validate and encode a request
    fn encode_request(&self, request: &Request) -> Result<AbcPdu>;

    /// How many bytes follow `function_code` in a response frame
    fn body_length(&self, function_code: u8) -> Result<BodyLength>;

    /// Decode a response PDU for `request`
    fn decode_response(&self, request: &Request, pdu: &AbcPdu) -> Result<Response>;
}

fn check_read_count(count: usize) -> Result<()> {
    if count == 0 || count > MAX_REGISTERS_PER_REQUEST {
        return Err(AbcError::validation(format!(
            "read of {} registers (allowed 1..={})",
            count, MAX_REGISTERS_PER_REQUEST
        )));
    }
    Ok(())
}

/// Turn an exception PDU into an error, and check the echoed function code
fn check_function(request: &Request, pdu: &AbcPdu) -> Result<()> {
    let expected = request.function_code();
    let actual = pdu
        .function_code()
        .ok_or_else(|| AbcError::malformed("empty PDU"))?;

    if actual == expected | EXCEPTION_FLAG {
        let code = pdu
            .exception_code()
            .ok_or_else(|| AbcError::malformed("exception response without code"))?;
        debug!("Device exception for {}: code {:02X}", request, code);
        return Err(AbcError::from_exception(expected, code));
    }
    if actual != expected {
        return Err(AbcError::malformed(format!(
            "function code mismatch: expected {:02X}, got {:02X}",
            expected, actual
        )));
    }
    Ok(())
}

/// Registers from a byte-count prefixed payload, checked against the request
fn decode_registers(request: &Request, pdu: &AbcPdu) -> Result<Response> {
    let payload = pdu.payload();
    let (&byte_count, data) = payload
        .split_first()
        .ok_or_else(|| AbcError::malformed("missing byte count"))?;

    let byte_count = usize::from(byte_count);
    let expected = request.read_addresses().len();
    if data.len() != byte_count || byte_count != expected * 2 {
        return Err(AbcError::malformed(format!(
            "byte count {} with {} data bytes, expected {} registers",
            byte_count,
            data.len(),
            expected
        )));
    }

    Ok(Response::Registers(
        data.chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
    ))
}

fn expect_payload_len(pdu: &AbcPdu, len: usize) -> Result<()> {
    if pdu.payload().len() != len {
        return Err(AbcError::malformed(format!(
            "FC{:02X} response has {} bytes, expected {}",
            pdu.function_code().unwrap_or_default(),
            pdu.payload().len(),
            len
        )));
    }
    Ok(())
}

/// Standard Modbus holding register functions
#[derive(Debug, Clone, Copy, Default)]
pub struct ModbusCodec;

impl PduCodec for ModbusCodec {
    fn encode_request(&self, request: &Request) -> Result<AbcPdu> {
        let pdu = match request {
            Request::ReadHoldingRegisters { start, count } => {
                check_read_count(usize::from(*count))?;
                if u32::from(*start) + u32::from(*count) > 0x1_0000 {
                    return Err(AbcError::illegal_address(format!(
                        "{} registers from {} run past 65535",
                        count, start
                    )));
                }
                PduBuilder::new()
                    .function_code(FC_READ_HOLDING_REGISTERS)?
                    .word(*start)?
                    .word(*count)?
                    .build()
            }
            Request::WriteSingleRegister { address, value } => PduBuilder::new()
                .function_code(FC_WRITE_SINGLE_REGISTER)?
                .word(*address)?
                .word(*value)?
                .build(),
            Request::WriteMultipleRegisters { start, values } => {
                if values.is_empty() || values.len() > MAX_REGISTERS_PER_REQUEST {
                    return Err(AbcError::validation(format!(
                        "write of {} registers (allowed 1..={})",
                        values.len(),
                        MAX_REGISTERS_PER_REQUEST
                    )));
                }
                PduBuilder::new()
                    .function_code(FC_WRITE_MULTIPLE_REGISTERS)?
                    .word(*start)?
                    .word(values.len() as u16)?
                    .byte((values.len() * 2) as u8)?
                    .words(values.iter().copied())?
                    .build()
            }
            other => {
                return Err(AbcError::illegal_function(format!(
                    "{} is not a standard function",
                    other
                )))
            }
        };
        Ok(pdu)
    }

    fn body_length(&self, function_code: u8) -> Result<BodyLength> {
        if function_code & EXCEPTION_FLAG != 0 {
            return Ok(BodyLength::Fixed(1));
        }
        match function_code {
            FC_READ_HOLDING_REGISTERS => Ok(BodyLength::LengthPrefixed),
            FC_WRITE_SINGLE_REGISTER | FC_WRITE_MULTIPLE_REGISTERS => Ok(BodyLength::Fixed(4)),
            other => Err(AbcError::malformed(format!(
                "unexpected function code {:02X} in response",
                other
            ))),
        }
    }

    fn decode_response(&self, request: &Request, pdu: &AbcPdu) -> Result<Response> {
        check_function(request, pdu)?;
        match request {
            Request::ReadHoldingRegisters { .. } => decode_registers(request, pdu),
            Request::WriteSingleRegister { address, value } => {
                expect_payload_len(pdu, 4)?;
                let echoed = (pdu.read_u16(1), pdu.read_u16(3));
                if echoed != (Some(*address), Some(*value)) {
                    return Err(AbcError::malformed(format!(
                        "write echo {:?} does not match {}={}",
                        echoed, address, value
                    )));
                }
                Ok(Response::WriteSingle {
                    address: *address,
                    value: *value,
                })
            }
            Request::WriteMultipleRegisters { start, values } => {
                expect_payload_len(pdu, 4)?;
                let count = values.len() as u16;
                if (pdu.read_u16(1), pdu.read_u16(3)) != (Some(*start), Some(count)) {
                    return Err(AbcError::malformed("write multiple echo mismatch"));
                }
                Ok(Response::WriteMultiple {
                    start: *start,
                    count,
                })
            }
            other => Err(AbcError::illegal_function(format!(
                "{} is not a standard function",
                other
            ))),
        }
    }
}

/// ABC dialect: function codes 65-68 on top of an inner codec
#[derive(Debug, Clone, Default)]
pub struct AbcCodec<I = ModbusCodec> {
    inner: I,
}

impl<I: PduCodec> AbcCodec<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    fn is_vendor_function(function_code: u8) -> bool {
        matches!(
            function_code & !EXCEPTION_FLAG,
            FC_READ_RANGES | FC_READ_REGISTERS | FC_WRITE_REGISTERS | FC_DIAGNOSTIC
        )
    }
}

impl<I: PduCodec> PduCodec for AbcCodec<I> {
    fn encode_request(&self, request: &Request) -> Result<AbcPdu> {
        let pdu = match request {
            Request::ReadRanges(pairs) => {
                let mut total = 0usize;
                for &(start, count) in pairs {
                    if count == 0 {
                        return Err(AbcError::validation(format!(
                            "empty range at {} in FC65 request",
                            start
                        )));
                    }
                    if u32::from(start) + u32::from(count) > 0x1_0000 {
                        return Err(AbcError::illegal_address(format!(
                            "{} registers from {} run past 65535",
                            count, start
                        )));
                    }
                    total += usize::from(count);
                }
                check_read_count(total)?;
                PduBuilder::new()
                    .function_code(FC_READ_RANGES)?
                    .words(pairs.iter().flat_map(|&(start, count)| [start, count]))?
                    .build()
            }
            Request::ReadRegisters(addrs) => {
                check_read_count(addrs.len())?;
                PduBuilder::new()
                    .function_code(FC_READ_REGISTERS)?
                    .words(addrs.iter().copied())?
                    .build()
            }
            Request::WriteRegisters(pairs) => {
                if pairs.is_empty() || pairs.len() > MAX_REGISTERS_PER_REQUEST {
                    return Err(AbcError::validation(format!(
                        "write of {} registers (allowed 1..={})",
                        pairs.len(),
                        MAX_REGISTERS_PER_REQUEST
                    )));
                }
                PduBuilder::new()
                    .function_code(FC_WRITE_REGISTERS)?
                    .words(pairs.iter().flat_map(|&(addr, value)| [addr, value]))?
                    .build()
            }
            Request::Diagnostic(a, b) => PduBuilder::new()
                .function_code(FC_DIAGNOSTIC)?
                .word(*a)?
                .word(*b)?
                .build(),
            standard => return self.inner.encode_request(standard),
        };
        Ok(pdu)
    }

    fn body_length(&self, function_code: u8) -> Result<BodyLength> {
        if !Self::is_vendor_function(function_code) {
            return self.inner.body_length(function_code);
        }
        if function_code & EXCEPTION_FLAG != 0 {
            return Ok(BodyLength::Fixed(1));
        }
        Ok(match function_code {
            FC_READ_RANGES | FC_READ_REGISTERS => BodyLength::LengthPrefixed,
            FC_WRITE_REGISTERS => BodyLength::Fixed(0),
            _ => BodyLength::Fixed(1),
        })
    }

    fn decode_response(&self, request: &Request, pdu: &AbcPdu) -> Result<Response> {
        match request {
            Request::ReadRanges(_) | Request::ReadRegisters(_) => {
                check_function(request, pdu)?;
                decode_registers(request, pdu)
            }
            Request::WriteRegisters(_) => {
                check_function(request, pdu)?;
                expect_payload_len(pdu, 0)?;
                Ok(Response::WriteAck)
            }
            Request::Diagnostic(..) => {
                check_function(request, pdu)?;
                expect_payload_len(pdu, 1)?;
                Ok(Response::Diagnostic(pdu.payload()[0]))
            }
            standard => self.inner.decode_response(standard, pdu),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn pdu(bytes: &[u8]) -> AbcPdu {
        AbcPdu::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_request_choice_for_spans() {
        let singles = [Span::Single(19), Span::Single(30)];
        assert_eq!(Request::for_spans(&singles), Request::ReadRegisters(vec![19, 30]));

        let mixed = [Span::range(19, 20), Span::Single(30)];
        assert_eq!(
            Request::for_spans(&mixed),
            Request::ReadRanges(vec![(19, 2), (30, 1)])
        );
        assert_eq!(Request::for_spans(&mixed).read_addresses(), vec![19, 20, 30]);
    }

    #[test]
    fn test_encode_vendor_requests() {
        let codec = AbcCodec::<ModbusCodec>::default();

        let encoded = codec
            .encode_request(&Request::ReadRanges(vec![(19, 2), (30, 1)]))
            .unwrap();
        assert_eq!(
            encoded.as_slice(),
            &[0x41, 0x00, 0x13, 0x00, 0x02, 0x00, 0x1E, 0x00, 0x01]
        );

        let encoded = codec
            .encode_request(&Request::ReadRegisters(vec![105, 106]))
            .unwrap();
        assert_eq!(encoded.as_slice(), &[0x42, 0x00, 0x69, 0x00, 0x6A]);

        let encoded = codec
            .encode_request(&Request::WriteRegisters(vec![(340, 3), (347, 9)]))
            .unwrap();
        assert_eq!(
            encoded.as_slice(),
            &[0x43, 0x01, 0x54, 0x00, 0x03, 0x01, 0x5B, 0x00, 0x09]
        );

        let encoded = codec.encode_request(&Request::Diagnostic(0x0001, 0xBEEF)).unwrap();
        assert_eq!(encoded.as_slice(), &[0x44, 0x00, 0x01, 0xBE, 0xEF]);
    }

    #[test]
    fn test_standard_requests_delegate() {
        let codec = AbcCodec::<ModbusCodec>::default();
        let encoded = codec
            .encode_request(&Request::WriteSingleRegister {
                address: 12_619,
                value: 685,
            })
            .unwrap();
        assert_eq!(encoded.as_slice(), &[0x06, 0x31, 0x4B, 0x02, 0xAD]);

        assert!(ModbusCodec
            .encode_request(&Request::ReadRegisters(vec![1]))
            .is_err());
    }

    #[test]
    fn test_read_count_limits() {
        let codec = AbcCodec::<ModbusCodec>::default();
        assert!(codec
            .encode_request(&Request::ReadRegisters((0..101).collect()))
            .is_err());
        assert!(codec
            .encode_request(&Request::ReadRanges(vec![(0, 60), (100, 41)]))
            .is_err());
        assert!(codec
            .encode_request(&Request::ReadRanges(vec![(10, 0)]))
            .is_err());
        assert!(matches!(
            codec.encode_request(&Request::ReadRanges(vec![(65_530, 10)])),
            Err(AbcError::IllegalDataAddress(_))
        ));
    }

    #[test]
    fn test_body_lengths() {
        let codec = AbcCodec::<ModbusCodec>::default();
        assert_eq!(codec.body_length(0x41).unwrap(), BodyLength::LengthPrefixed);
        assert_eq!(codec.body_length(0x42).unwrap(), BodyLength::LengthPrefixed);
        assert_eq!(codec.body_length(0x43).unwrap(), BodyLength::Fixed(0));
        assert_eq!(codec.body_length(0x44).unwrap(), BodyLength::Fixed(1));
        assert_eq!(codec.body_length(0xC1).unwrap(), BodyLength::Fixed(1));
        assert_eq!(codec.body_length(0x03).unwrap(), BodyLength::LengthPrefixed);
        assert_eq!(codec.body_length(0x06).unwrap(), BodyLength::Fixed(4));
        assert_eq!(codec.body_length(0x83).unwrap(), BodyLength::Fixed(1));
        assert!(codec.body_length(0x2B).is_err());
    }

    #[test]
    fn test_decode_positional_registers() {
        let codec = AbcCodec::<ModbusCodec>::default();
        let request = Request::ReadRanges(vec![(19, 2), (30, 1)]);
        let response = codec
            .decode_response(
                &request,
                &pdu(&[0x41, 0x06, 0x02, 0x9A, 0xFF, 0xEC, 0x00, 0x08]),
            )
            .unwrap();
        assert_eq!(response, Response::Registers(vec![666, 0xFFEC, 8]));
    }

    #[test]
    fn test_decode_count_mismatch_is_malformed() {
        let codec = AbcCodec::<ModbusCodec>::default();
        let request = Request::ReadRegisters(vec![1, 2]);
        let result = codec.decode_response(&request, &pdu(&[0x42, 0x02, 0x00, 0x01]));
        assert!(matches!(result, Err(AbcError::MalformedResponse(_))));
    }

    #[test]
    fn test_decode_exceptions() {
        let codec = AbcCodec::<ModbusCodec>::default();
        let request = Request::ReadRegisters(vec![99]);
        assert!(matches!(
            codec.decode_response(&request, &pdu(&[0xC2, 0x02])),
            Err(AbcError::IllegalDataAddress(_))
        ));

        let request = Request::Diagnostic(0, 0);
        assert!(matches!(
            codec.decode_response(&request, &pdu(&[0xC4, 0x01])),
            Err(AbcError::IllegalFunction(_))
        ));

        let request = Request::WriteSingleRegister { address: 1, value: 2 };
        assert!(matches!(
            codec.decode_response(&request, &pdu(&[0x86, 0x02])),
            Err(AbcError::IllegalDataAddress(_))
        ));
    }

    #[test]
    fn test_decode_write_and_diagnostic() {
        let codec = AbcCodec::<ModbusCodec>::default();
        assert_eq!(
            codec
                .decode_response(&Request::WriteRegisters(vec![(340, 3)]), &pdu(&[0x43]))
                .unwrap(),
            Response::WriteAck
        );
        assert_eq!(
            codec
                .decode_response(&Request::Diagnostic(1, 2), &pdu(&[0x44, 0x00]))
                .unwrap(),
            Response::Diagnostic(0)
        );
        assert!(codec
            .decode_response(&Request::Diagnostic(1, 2), &pdu(&[0x44]))
            .is_err());

        let request = Request::WriteSingleRegister {
            address: 340,
            value: 3,
        };
        assert!(codec
            .decode_response(&request, &pdu(&[0x06, 0x01, 0x54, 0x00, 0x03]))
            .is_ok());
        assert!(matches!(
            codec.decode_response(&request, &pdu(&[0x06, 0x01, 0x54, 0x00, 0x04])),
            Err(AbcError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_function_code_mismatch_is_malformed() {
        let codec = AbcCodec::<ModbusCodec>::default();
        let result = codec.decode_response(
            &Request::ReadRegisters(vec![1]),
            &pdu(&[0x41, 0x02, 0x00, 0x01]),
        );
        assert!(matches!(result, Err(AbcError::MalformedResponse(_))));
    }
}
