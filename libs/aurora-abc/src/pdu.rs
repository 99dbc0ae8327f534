//! ABC protocol data unit
//!
//! Fixed-size stack buffer sized for the largest FC65 request, so building a
//! request or holding a response never allocates.

use tracing::debug;

use crate::constants::{self, EXCEPTION_FLAG, MAX_PDU_SIZE};
use crate::error::{AbcError, Result};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct AbcPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl AbcPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from received bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(AbcError::malformed(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        match (pdu.function_code(), pdu.exception_code()) {
            (Some(fc), Some(code)) => debug!(
                "PDU parsed: FC={:02X} ({}), exception_code={:02X}",
                fc,
                Self::function_code_description(fc),
                code
            ),
            (Some(fc), None) => debug!(
                "PDU parsed: FC={:02X} ({}), data_len={}",
                fc,
                Self::function_code_description(fc),
                pdu.len - 1
            ),
            _ => debug!("PDU parsed: empty PDU"),
        }

        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(AbcError::validation("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.push(hi)?;
        self.push(lo)
    }

    /// Extend with a byte slice
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(AbcError::validation(format!(
                "PDU would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        (self.len > 0).then(|| self.data[0])
    }

    /// Bytes following the function code
    #[inline]
    pub fn payload(&self) -> &[u8] {
        if self.len > 0 {
            &self.data[1..self.len]
        } else {
            &[]
        }
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .is_some_and(|fc| fc & EXCEPTION_FLAG != 0)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        (self.is_exception() && self.len > 1).then(|| self.data[1])
    }

    /// Big-endian u16 at `offset` within the whole PDU
    #[inline]
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        (offset + 2 <= self.len).then(|| u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & !EXCEPTION_FLAG {
            constants::FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
            constants::FC_WRITE_SINGLE_REGISTER => "Write Single Register",
            constants::FC_WRITE_MULTIPLE_REGISTERS => "Write Multiple Registers",
            constants::FC_READ_RANGES => "Read Register Ranges",
            constants::FC_READ_REGISTERS => "Read Registers",
            constants::FC_WRITE_REGISTERS => "Write Registers",
            constants::FC_DIAGNOSTIC => "Diagnostic",
            _ => "Unknown Function",
        }
    }
}

impl Default for AbcPdu {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AbcPdu {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for AbcPdu {}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: AbcPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self { pdu: AbcPdu::new() }
    }

    #[inline]
    pub fn function_code(mut self, fc: u8) -> Result<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    /// Add a big-endian word (address, quantity or register value)
    #[inline]
    pub fn word(mut self, value: u16) -> Result<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    /// Add a sequence of big-endian words
    pub fn words<I>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = u16>,
    {
        for value in values {
            self.pdu.push_u16(value)?;
        }
        Ok(self)
    }

    #[inline]
    pub fn byte(mut self, b: u8) -> Result<Self> {
        self.pdu.push(b)?;
        Ok(self)
    }

    pub fn build(self) -> AbcPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X} ({}), total_len={}",
                fc,
                AbcPdu::function_code_description(fc),
                self.pdu.len()
            );
        }
        self.pdu
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_pdu_basic_operations() {
        let mut pdu = AbcPdu::new();
        assert!(pdu.is_empty());

        pdu.push(0x42).unwrap();
        pdu.push_u16(0x0105).unwrap();
        pdu.push_u16(0x3023).unwrap();

        assert_eq!(pdu.function_code(), Some(0x42));
        assert!(!pdu.is_exception());
        assert_eq!(pdu.as_slice(), &[0x42, 0x01, 0x05, 0x30, 0x23]);
        assert_eq!(pdu.payload(), &[0x01, 0x05, 0x30, 0x23]);
        assert_eq!(pdu.read_u16(3), Some(0x3023));
        assert_eq!(pdu.read_u16(4), None);
    }

    #[test]
    fn test_pdu_builder() {
        let pdu = PduBuilder::new()
            .function_code(0x41)
            .unwrap()
            .words([740, 2, 900, 1])
            .unwrap()
            .build();

        assert_eq!(
            pdu.as_slice(),
            &[0x41, 0x02, 0xE4, 0x00, 0x02, 0x03, 0x84, 0x00, 0x01]
        );
    }

    #[test]
    fn test_exception_response() {
        let pdu = AbcPdu::from_slice(&[0xC1, 0x02]).unwrap();
        assert!(pdu.is_exception());
        assert_eq!(pdu.exception_code(), Some(0x02));
        assert_eq!(
            AbcPdu::function_code_description(0xC1),
            "Read Register Ranges"
        );
    }

    #[test]
    fn test_pdu_overflow() {
        let mut pdu = AbcPdu::new();
        assert!(pdu.extend(&vec![0xFF; MAX_PDU_SIZE + 1]).is_err());

        pdu.extend(&vec![0x01; MAX_PDU_SIZE]).unwrap();
        assert!(matches!(pdu.push(0), Err(AbcError::ValidationError(_))));
    }

    #[test]
    fn test_pdu_from_slice_too_large() {
        let result = AbcPdu::from_slice(&vec![0xFF; MAX_PDU_SIZE + 1]);
        assert!(matches!(result, Err(AbcError::MalformedResponse(_))));
    }
}
