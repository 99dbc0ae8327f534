//! In-process simulated ABC
//!
//! Answers RTU frames byte-for-byte like the controller does, including the
//! vendor function codes, so the client stack can be exercised without a
//! serial line. Addresses can be made to reject reads (exception 2) or to
//! stay silent (the client sees a timeout).

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Transport, TransportError};
use crate::constants::{
    EXCEPTION_FLAG, EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_FUNCTION, FC_DIAGNOSTIC,
    FC_READ_HOLDING_REGISTERS, FC_READ_RANGES, FC_READ_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_REGISTERS, FC_WRITE_SINGLE_REGISTER, MAX_REGISTERS_PER_REQUEST,
};
use crate::frame::crc16;

#[derive(Debug, Default)]
struct DeviceState {
    unit_id: u8,
    registers: BTreeMap<u16, u16>,
    rejected: HashSet<u16>,
    silent: HashSet<u16>,
    disabled_functions: HashSet<u8>,
    corrupt_crc: bool,
    /// Replies to swallow before answering again
    dropped_replies: usize,
    /// Reply bytes not yet consumed by the client
    pending: VecDeque<u8>,
    /// Request PDUs in arrival order
    requests: Vec<Vec<u8>>,
}

enum Reply {
    Data(Vec<u8>),
    Exception(u8),
    Silent,
}

impl DeviceState {
    fn words(payload: &[u8]) -> Vec<u16> {
        payload
            .chunks_exact(2)
            .map(|w| u16::from_be_bytes([w[0], w[1]]))
            .collect()
    }

    fn read(&self, fc: u8, addresses: &[u16]) -> Reply {
        if addresses.is_empty() || addresses.len() > MAX_REGISTERS_PER_REQUEST {
            return Reply::Exception(0x03);
        }
        if addresses.iter().any(|a| self.silent.contains(a)) {
            return Reply::Silent;
        }
        if addresses.iter().any(|a| self.rejected.contains(a)) {
            return Reply::Exception(EXCEPTION_ILLEGAL_DATA_ADDRESS);
        }
        let mut data = vec![fc, (addresses.len() * 2) as u8];
        for addr in addresses {
            let value = self.registers.get(addr).copied().unwrap_or_default();
            data.extend_from_slice(&value.to_be_bytes());
        }
        Reply::Data(data)
    }

    fn write(&mut self, writes: &[(u16, u16)]) -> Option<Reply> {
        if writes.iter().any(|(a, _)| self.silent.contains(a)) {
            return Some(Reply::Silent);
        }
        if writes.iter().any(|(a, _)| self.rejected.contains(a)) {
            return Some(Reply::Exception(EXCEPTION_ILLEGAL_DATA_ADDRESS));
        }
        for &(addr, value) in writes {
            self.registers.insert(addr, value);
        }
        None
    }

    fn process(&mut self, pdu: &[u8]) -> Reply {
        let Some((&fc, payload)) = pdu.split_first() else {
            return Reply::Silent;
        };
        if self.disabled_functions.contains(&fc) {
            return Reply::Exception(EXCEPTION_ILLEGAL_FUNCTION);
        }
        let words = Self::words(payload);

        match fc {
            FC_READ_HOLDING_REGISTERS if words.len() == 2 => {
                let addrs: Vec<u16> = (0..words[1]).map(|i| words[0].wrapping_add(i)).collect();
                self.read(fc, &addrs)
            }
            FC_READ_RANGES if payload.len() % 4 == 0 => {
                let addrs: Vec<u16> = words
                    .chunks_exact(2)
                    .flat_map(|p| (0..p[1]).map(move |i| p[0].wrapping_add(i)))
                    .collect();
                self.read(fc, &addrs)
            }
            FC_READ_REGISTERS if payload.len() % 2 == 0 => self.read(fc, &words),
            FC_WRITE_SINGLE_REGISTER if words.len() == 2 => self
                .write(&[(words[0], words[1])])
                .unwrap_or_else(|| Reply::Data(pdu.to_vec())),
            FC_WRITE_MULTIPLE_REGISTERS if words.len() >= 2 => {
                let start = words[0];
                let values = Self::words(payload.get(5..).unwrap_or_default());
                let writes: Vec<(u16, u16)> = values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (start.wrapping_add(i as u16), v))
                    .collect();
                self.write(&writes)
                    .unwrap_or_else(|| Reply::Data(pdu[..5].to_vec()))
            }
            FC_WRITE_REGISTERS if payload.len() % 4 == 0 => {
                let writes: Vec<(u16, u16)> = words.chunks_exact(2).map(|p| (p[0], p[1])).collect();
                self.write(&writes).unwrap_or_else(|| Reply::Data(vec![fc]))
            }
            FC_DIAGNOSTIC if payload.len() == 4 => Reply::Data(vec![fc, 0x00]),
            _ => Reply::Exception(EXCEPTION_ILLEGAL_FUNCTION),
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        if frame.len() < 4 {
            warn!("Mock device ignoring short frame");
            return;
        }
        let crc_offset = frame.len() - 2;
        let crc = u16::from_le_bytes([frame[crc_offset], frame[crc_offset + 1]]);
        if crc != crc16(&frame[..crc_offset]) || frame[0] != self.unit_id {
            debug!("Mock device ignoring frame {}", hex::encode(frame));
            return;
        }

        let pdu = &frame[1..crc_offset];
        self.requests.push(pdu.to_vec());

        let body = match self.process(pdu) {
            Reply::Data(body) => body,
            Reply::Exception(code) => vec![pdu[0] | EXCEPTION_FLAG, code],
            Reply::Silent => return,
        };
        if self.dropped_replies > 0 {
            self.dropped_replies -= 1;
            debug!("Mock device dropping reply to FC{:02X}", pdu[0]);
            return;
        }

        let mut reply = Vec::with_capacity(body.len() + 3);
        reply.push(self.unit_id);
        reply.extend_from_slice(&body);
        let mut crc = crc16(&reply);
        if self.corrupt_crc {
            crc ^= 0xFFFF;
        }
        reply.extend_from_slice(&crc.to_le_bytes());
        self.pending.extend(reply);
    }
}

/// Simulated controller; clones share the same device
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new(unit_id: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                unit_id,
                ..DeviceState::default()
            })),
        }
    }

    /// Preload register values; unset readable registers answer 0
    pub fn with_registers<I>(self, registers: I) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        self.state.lock().registers.extend(registers);
        self
    }

    /// Any request touching `addresses` fails with exception 2
    pub fn reject<I: IntoIterator<Item = u16>>(self, addresses: I) -> Self {
        self.state.lock().rejected.extend(addresses);
        self
    }

    /// Any request touching `addresses` gets no reply
    pub fn silence<I: IntoIterator<Item = u16>>(self, addresses: I) -> Self {
        self.state.lock().silent.extend(addresses);
        self
    }

    /// Function code answered with exception 1
    pub fn disable_function(self, function_code: u8) -> Self {
        self.state.lock().disabled_functions.insert(function_code);
        self
    }

    /// Flip the CRC of every reply
    pub fn corrupt_replies(self, corrupt: bool) -> Self {
        self.state.lock().corrupt_crc = corrupt;
        self
    }

    /// Swallow the next `count` replies, as a noisy line would
    pub fn drop_replies(self, count: usize) -> Self {
        self.state.lock().dropped_replies = count;
        self
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.lock().registers.get(&address).copied()
    }

    /// Request PDUs received so far
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().requests.clone()
    }

    /// Function codes of requests received so far
    pub fn function_codes(&self) -> Vec<u8> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|pdu| pdu.first().copied())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }
}

#[async_trait]
impl Transport for MockDevice {
    fn transport_type(&self) -> &str {
        "mock"
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.state.lock().handle_frame(data);
        Ok(())
    }

    async fn receive_exact(
        &mut self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.pending.len() < buffer.len() {
            state.pending.clear();
            return Err(TransportError::Timeout(format!(
                "{} bytes not received within {:?}",
                buffer.len(),
                timeout
            )));
        }
        let len = buffer.len();
        for (slot, byte) in buffer.iter_mut().zip(state.pending.drain(..len)) {
            *slot = byte;
        }
        Ok(())
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().pending.clear();
        Ok(())
    }
}
