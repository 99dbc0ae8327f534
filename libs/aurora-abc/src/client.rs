//! Single-transaction driver for one ABC link
//!
//! [`AbcLink`] owns the transport and the codec. One call to
//! [`AbcLink::execute`] is one request on the wire and one response read
//! back, framed by function code. Reads that time out are resent as fresh
//! transactions up to `read_retries` times; writes are sent exactly once.

use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::{AbcCodec, BodyLength, PduCodec, Request, Response};
use crate::config::AbcConfig;
use crate::constants::{
    DEFAULT_READ_RETRIES, DEFAULT_TIMEOUT_MS, DEFAULT_UNIT_ID, RTU_CRC_LEN, RTU_HEADER_LEN,
};
use crate::error::{AbcError, Result};
use crate::frame::RtuFrame;
use crate::transport::{StreamTransport, Transport};

#[derive(Debug)]
pub struct AbcLink {
    transport: Box<dyn Transport>,
    codec: Box<dyn PduCodec>,
    unit_id: u8,
    timeout: Duration,
    read_retries: u32,
}

impl AbcLink {
    /// Link with the ABC dialect codec and default settings
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Box::new(transport),
            codec: Box::new(<AbcCodec>::default()),
            unit_id: DEFAULT_UNIT_ID,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_retries: DEFAULT_READ_RETRIES,
        }
    }

    /// Link settings taken from `config`
    pub fn with_config<T: Transport + 'static>(transport: T, config: &AbcConfig) -> Self {
        Self::new(transport)
            .with_unit_id(config.unit_id)
            .with_timeout(config.timeout())
            .with_read_retries(config.read_retries)
    }

    /// Open the endpoint named in `config` and wrap it
    pub async fn connect(config: &AbcConfig) -> Result<Self> {
        let transport = StreamTransport::open(config).await?;
        Ok(Self::with_config(transport, config))
    }

    pub fn with_codec<C: PduCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_retries(mut self, read_retries: u32) -> Self {
        self.read_retries = read_retries;
        self
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport_type(&self) -> &str {
        self.transport.transport_type()
    }

    /// Run one request, resending reads that time out
    pub async fn execute(&mut self, request: &Request) -> Result<Response> {
        let pdu = self.codec.encode_request(request)?;
        let frame = RtuFrame::new(self.unit_id, pdu).to_bytes();
        let attempts = if request.is_write() {
            1
        } else {
            self.read_retries + 1
        };

        let mut attempt = 1;
        loop {
            match self.transact(request, &frame).await {
                Err(e) if e.is_timeout() && attempt < attempts => {
                    warn!(
                        "{} timed out (attempt {}/{}), retrying",
                        request, attempt, attempts
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn transact(&mut self, request: &Request, frame: &[u8]) -> Result<Response> {
        self.transport.clear_input().await?;

        debug!("TX [{}]: {}", request, hex::encode(frame));
        self.transport.send(frame).await?;

        let mut reply = vec![0u8; RTU_HEADER_LEN];
        self.transport.receive_exact(&mut reply, self.timeout).await?;
        if reply[0] != self.unit_id {
            return Err(AbcError::malformed(format!(
                "reply from unit {} while talking to unit {}",
                reply[0], self.unit_id
            )));
        }

        let body_len = match self.codec.body_length(reply[1])? {
            BodyLength::Fixed(len) => len,
            BodyLength::LengthPrefixed => {
                let mut count = [0u8; 1];
                self.transport.receive_exact(&mut count, self.timeout).await?;
                reply.push(count[0]);
                usize::from(count[0])
            }
        };

        let head = reply.len();
        reply.resize(head + body_len + RTU_CRC_LEN, 0);
        self.transport
            .receive_exact(&mut reply[head..], self.timeout)
            .await?;
        debug!("RX [{}]: {}", request, hex::encode(&reply));

        let frame = RtuFrame::from_bytes(&reply)?;
        self.codec.decode_response(request, &frame.pdu)
    }
}
