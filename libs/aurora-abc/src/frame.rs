//! RTU framing: unit id, PDU, CRC-16/MODBUS (little-endian)

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::{MIN_RTU_FRAME_LEN, RTU_CRC_LEN};
use crate::error::{AbcError, Result};
use crate::pdu::AbcPdu;

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS over `data`
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// One RTU application data unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtuFrame {
    pub unit_id: u8,
    pub pdu: AbcPdu,
}

impl RtuFrame {
    pub fn new(unit_id: u8, pdu: AbcPdu) -> Self {
        Self { unit_id, pdu }
    }

    /// Serialize with trailing CRC
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.pdu.len() + RTU_CRC_LEN);
        bytes.push(self.unit_id);
        bytes.extend_from_slice(self.pdu.as_slice());
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Parse a complete frame, verifying its CRC
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_RTU_FRAME_LEN {
            return Err(AbcError::malformed(format!(
                "RTU frame too short: {} bytes",
                data.len()
            )));
        }

        let crc_offset = data.len() - RTU_CRC_LEN;
        let received = u16::from_le_bytes([data[crc_offset], data[crc_offset + 1]]);
        let calculated = crc16(&data[..crc_offset]);
        if received != calculated {
            return Err(AbcError::malformed(format!(
                "CRC mismatch: expected {:04X}, got {:04X}",
                calculated, received
            )));
        }

        Ok(Self {
            unit_id: data[0],
            pdu: AbcPdu::from_slice(&data[1..crc_offset])?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_frame() {
        // 01 03 00 00 00 0A -> C5 CD
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xCDC5);
    }

    #[test]
    fn test_frame_round_trip() {
        let pdu = AbcPdu::from_slice(&[0x03, 0x00, 0x00, 0x00, 0x0A]).unwrap();
        let bytes = RtuFrame::new(1, pdu.clone()).to_bytes();
        assert_eq!(
            bytes,
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]
        );

        let frame = RtuFrame::from_bytes(&bytes).unwrap();
        assert_eq!(frame.unit_id, 1);
        assert_eq!(frame.pdu, pdu);
    }

    #[test]
    fn test_crc_mismatch_is_malformed() {
        let result = RtuFrame::from_bytes(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCE]);
        match result {
            Err(AbcError::MalformedResponse(msg)) => assert!(msg.contains("CRC mismatch")),
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_short_frame_is_malformed() {
        assert!(matches!(
            RtuFrame::from_bytes(&[0x01, 0x43, 0x00]),
            Err(AbcError::MalformedResponse(_))
        ));
    }
}
