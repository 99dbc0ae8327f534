//! WaterFurnace Aurora ABC register bus client
//!
//! Talks Modbus RTU plus the ABC's vendor function codes (65-68) to an Aurora
//! Base Controller over a serial line or a serial-over-TCP bridge.
//!
//! # Key Components
//!
//! - **Planner**: splits address sets into transaction-sized chunks
//! - **Codec**: `AbcCodec` wraps a standard Modbus codec and adds FC 65-68
//! - **AbcLink**: one request / one response over a `Transport`
//! - **QueryExecutor**: fetches with fallback, validated writes, progress
//! - **Registry**: names, valid ranges, converters and display formats
//! - **Decode / encode**: raw registers to typed values, and per-property
//!   validated encoders for writes

pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod convert;
pub mod encode;
pub mod error;
pub mod executor;
pub mod frame;
pub mod pdu;
pub mod planner;
pub mod query;
pub mod registers;
pub mod registry;
pub mod snapshot;
pub mod transport;
pub mod value;

pub use client::AbcLink;
pub use codec::{AbcCodec, BodyLength, ModbusCodec, PduCodec, Request, Response};
pub use config::AbcConfig;
pub use encode::{Encoded, EncodeRule, PropertySpec, PropertyTable, Setting};
pub use error::{AbcError, Result};
pub use executor::{
    FetchOptions, FetchProgress, ProgressObserver, ProgressThrottle, QueryExecutor,
    TracingProgress,
};
pub use planner::{plan, Chunk, Span};
pub use query::{Query, QueryItem};
pub use registers::{decode, diff_registers, format_register, print_registers};
pub use registry::Registry;
pub use snapshot::RegisterSnapshot;
pub use transport::{MockDevice, StreamTransport, Transport, TransportError};
pub use value::{FlagSet, RegisterValue};
