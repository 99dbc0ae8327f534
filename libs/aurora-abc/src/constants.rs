//! Protocol constants for the ABC dialect of Modbus RTU
//!
//! The ABC answers the standard holding register functions plus four
//! vendor function codes (65-68). Limits below are the ones the controller
//! actually enforces, which are tighter than the Modbus specification.

// ============================================================================
// Function Codes
// ============================================================================

/// FC03 - Read Holding Registers
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// FC06 - Write Single Register
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// FC16 - Write Multiple Registers
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// FC65 - Read discontiguous ranges, request is (start, count) pairs
pub const FC_READ_RANGES: u8 = 0x41;

/// FC66 - Read discontiguous single registers, request is a list of addresses
pub const FC_READ_REGISTERS: u8 = 0x42;

/// FC67 - Write discontiguous registers, request is (address, value) pairs
pub const FC_WRITE_REGISTERS: u8 = 0x43;

/// FC68 - Undocumented diagnostic, 4 byte request and 1 byte response
pub const FC_DIAGNOSTIC: u8 = 0x44;

/// Set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Exception code 1
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Exception code 2
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Largest register count the ABC serves in one transaction
pub const MAX_REGISTERS_PER_REQUEST: usize = 100;

/// Maximum PDU size
///
/// An FC65 request for a chunk made entirely of spans carries one 4 byte
/// (start, count) pair per span:
/// - Function Code: 1 byte
/// - Pairs: 100 × 4 bytes
/// - Total: 401 bytes, above the 253 byte Modbus limit
pub const MAX_PDU_SIZE: usize = 1 + MAX_REGISTERS_PER_REQUEST * 4;

/// Unit id + function code
pub const RTU_HEADER_LEN: usize = 2;

/// CRC-16/MODBUS trailer, little-endian
pub const RTU_CRC_LEN: usize = 2;

/// Smallest valid RTU frame: unit id, function code, CRC
pub const MIN_RTU_FRAME_LEN: usize = RTU_HEADER_LEN + RTU_CRC_LEN;

// ============================================================================
// Register Values
// ============================================================================

/// Raw value meaning "manual control disabled" on several registers
pub const MANUAL_CONTROL_OFF: u16 = 0x7fff;

// ============================================================================
// Link Defaults
// ============================================================================

pub const DEFAULT_BAUD_RATE: u32 = 19_200;

pub const DEFAULT_UNIT_ID: u8 = 1;

/// Per-attempt response deadline
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Extra attempts for a read that timed out
pub const DEFAULT_READ_RETRIES: u32 = 2;

/// Minimum spacing between two progress notifications of one fetch
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_fits_worst_case_chunk() {
        // Function code + 100 (start, count) pairs
        assert_eq!(MAX_PDU_SIZE, 401);
        // Response: function code + byte count + 100 registers
        assert!(2 + MAX_REGISTERS_PER_REQUEST * 2 <= MAX_PDU_SIZE);
        // Byte count must fit in one byte
        assert!(MAX_REGISTERS_PER_REQUEST * 2 <= u8::MAX as usize);
    }

    #[test]
    fn test_custom_function_codes() {
        assert_eq!(FC_READ_RANGES, 65);
        assert_eq!(FC_READ_REGISTERS, 66);
        assert_eq!(FC_WRITE_REGISTERS, 67);
        assert_eq!(FC_DIAGNOSTIC, 68);
        assert_eq!(FC_READ_RANGES | EXCEPTION_FLAG, 0xC1);
    }
}
