//! Byte stream transports: a local serial port or a raw TCP socket to a
//! serial-over-network bridge

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use super::{Transport, TransportError};
use crate::config::AbcConfig;

/// Stream transport type
#[derive(Debug)]
pub enum StreamTransport {
    /// Raw TCP socket
    Tcp(TcpStream),
    /// Serial RS-485 line
    Serial(SerialStream),
}

impl StreamTransport {
    /// Open the endpoint named by `config.uri`: `tcp://host:port` or a device path
    pub async fn open(config: &AbcConfig) -> Result<Self, TransportError> {
        match config.uri.strip_prefix("tcp://") {
            Some(addr) => Self::connect_tcp(addr, config.connect_timeout()).await,
            None => Self::open_serial(
                &config.uri,
                config.baud_rate,
                config.data_bits,
                config.stop_bits,
                &config.parity,
            ),
        }
    }

    /// Create a TCP connection
    pub async fn connect_tcp(addr: &str, timeout_duration: Duration) -> Result<Self, TransportError> {
        info!("Connecting to ABC bridge: {}", addr);

        match timeout(timeout_duration, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }
                info!("Connected to ABC bridge: {}", addr);
                Ok(StreamTransport::Tcp(stream))
            }
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", addr, e);
                Err(TransportError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    addr, e
                )))
            }
            Err(_) => {
                warn!("Connection to {} timed out", addr);
                Err(TransportError::Timeout(format!(
                    "Connection to {} timed out",
                    addr
                )))
            }
        }
    }

    /// Open a serial port
    pub fn open_serial(
        path: &str,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: &str,
    ) -> Result<Self, TransportError> {
        info!("Opening serial port: {} at {} baud", path, baud_rate);

        let parity = match parity.to_ascii_lowercase().as_str() {
            "even" => tokio_serial::Parity::Even,
            "odd" => tokio_serial::Parity::Odd,
            "none" => tokio_serial::Parity::None,
            other => {
                return Err(TransportError::ConfigError(format!(
                    "unknown parity '{}'",
                    other
                )))
            }
        };

        let data_bits = match data_bits {
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => {
                return Err(TransportError::ConfigError(format!(
                    "unsupported data bits {}",
                    other
                )))
            }
        };

        let stop_bits = match stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        match tokio_serial::new(path, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .open_native_async()
        {
            Ok(port) => {
                info!("Opened serial port: {}", path);
                Ok(StreamTransport::Serial(port))
            }
            Err(e) => {
                error!("Failed to open serial port {}: {}", path, e);
                Err(TransportError::ConnectionFailed(format!(
                    "Failed to open serial port {}: {}",
                    path, e
                )))
            }
        }
    }
}

fn read_error(err: std::io::Error) -> TransportError {
    if err.kind() == ErrorKind::UnexpectedEof {
        TransportError::ConnectionLost("connection closed by peer".to_string())
    } else {
        TransportError::ReceiveFailed(err.to_string())
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn transport_type(&self) -> &str {
        match self {
            StreamTransport::Tcp(_) => "tcp",
            StreamTransport::Serial(_) => "serial",
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let result = match self {
            StreamTransport::Tcp(stream) => stream.write_all(data).await,
            StreamTransport::Serial(port) => match port.write_all(data).await {
                Ok(()) => port.flush().await,
                Err(e) => Err(e),
            },
        };
        result.map_err(|e| {
            error!("{} send error: {}", self.transport_type(), e);
            TransportError::SendFailed(e.to_string())
        })?;
        debug!("Sent {} bytes via {}", data.len(), self.transport_type());
        Ok(())
    }

    async fn receive_exact(
        &mut self,
        buffer: &mut [u8],
        timeout_duration: Duration,
    ) -> Result<(), TransportError> {
        let read = match self {
            StreamTransport::Tcp(stream) => timeout(timeout_duration, stream.read_exact(buffer)).await,
            StreamTransport::Serial(port) => timeout(timeout_duration, port.read_exact(buffer)).await,
        };
        match read {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(read_error(e)),
            Err(_) => {
                debug!("{} receive timeout", self.transport_type());
                Err(TransportError::Timeout(format!(
                    "{} bytes not received within {:?}",
                    buffer.len(),
                    timeout_duration
                )))
            }
        }
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        match self {
            StreamTransport::Serial(port) => port
                .clear(ClearBuffer::Input)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string())),
            StreamTransport::Tcp(stream) => {
                let mut scratch = [0u8; 256];
                let mut discarded = 0usize;
                loop {
                    match stream.try_read(&mut scratch) {
                        Ok(0) => {
                            return Err(TransportError::ConnectionLost(
                                "connection closed by peer".to_string(),
                            ))
                        }
                        Ok(n) => discarded += n,
                        Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                        Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
                    }
                }
                if discarded > 0 {
                    warn!("Discarded {} stale bytes", discarded);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_round_trip_and_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&[0x01, 0x44, 0x00]).await.unwrap();
            // keep the socket open until the client is done
            let mut rest = [0u8; 1];
            let _ = socket.read(&mut rest).await;
        });

        let mut transport = StreamTransport::connect_tcp(&addr, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(transport.transport_type(), "tcp");

        transport.send(&[1, 2, 3, 4]).await.unwrap();
        let mut reply = [0u8; 3];
        transport
            .receive_exact(&mut reply, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, [0x01, 0x44, 0x00]);

        let mut more = [0u8; 2];
        let result = transport
            .receive_exact(&mut more, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));

        drop(transport);
        server.await.unwrap();
    }

    #[test]
    fn test_bad_parity_rejected() {
        let result = StreamTransport::open_serial("/dev/null", 19_200, 8, 1, "mark");
        assert!(matches!(result, Err(TransportError::ConfigError(_))));
    }
}
