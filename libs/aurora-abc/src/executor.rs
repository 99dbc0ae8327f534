//! Query execution with fallback
//!
//! [`QueryExecutor`] turns a [`Query`] into wire transactions, one chunk at a
//! time, and merges the answers into a [`RegisterSnapshot`] in request
//! order.
//!
//! When the device refuses a chunk of an implicit query, each span of the
//! chunk is retried on its own and spans that still fail are left out. With
//! [`FetchOptions::exhaustive`] a failing range is further probed register by
//! register, and timeouts escalate the same way instead of aborting. A
//! timeout on a single register always aborts the fetch. Strict queries
//! surface every error unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::AbcLink;
use crate::codec::{Request, Response};
use crate::config::AbcConfig;
use crate::constants::DEFAULT_PROGRESS_INTERVAL_SECS;
use crate::encode::{PropertyTable, Setting};
use crate::error::{AbcError, Result};
use crate::planner::{plan, Chunk, Span};
use crate::query::Query;
use crate::registers;
use crate::registry::Registry;
use crate::snapshot::RegisterSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Probe failing ranges register by register
    pub exhaustive: bool,
}

impl FetchOptions {
    pub fn exhaustive() -> Self {
        Self { exhaustive: true }
    }
}

/// Progress of a running fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub chunks_done: usize,
    pub chunks_total: usize,
    pub registers_read: usize,
    pub elapsed: Duration,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &FetchProgress);
}

/// Logs progress at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, progress: &FetchProgress) {
        info!(
            "Fetched {}/{} chunks ({} registers) in {:.1}s",
            progress.chunks_done,
            progress.chunks_total,
            progress.registers_read,
            progress.elapsed.as_secs_f64()
        );
    }
}

/// Lets a notification through at most once per interval
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    pub fn ready_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.interval {
            return false;
        }
        self.last = now;
        true
    }
}

/// Register values gathered during one fetch
#[derive(Debug, Default)]
struct Gathered {
    values: HashMap<u16, u16>,
}

impl Gathered {
    fn merge(&mut self, addresses: &[u16], values: Vec<u16>) {
        self.values.extend(addresses.iter().copied().zip(values));
    }
}

/// Cheap to clone; clones share the link and queue on its lock
#[derive(Clone)]
pub struct QueryExecutor {
    link: Arc<Mutex<AbcLink>>,
    registry: Arc<Registry>,
    properties: Arc<PropertyTable>,
    progress_interval: Duration,
    observer: Arc<dyn ProgressObserver>,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("progress_interval", &self.progress_interval)
            .finish_non_exhaustive()
    }
}

impl QueryExecutor {
    /// Executor over the ABC register map
    pub fn new(link: AbcLink) -> Self {
        Self::with_registry(link, Registry::shared())
    }

    pub fn with_registry(link: AbcLink, registry: Arc<Registry>) -> Self {
        Self {
            link: Arc::new(Mutex::new(link)),
            registry,
            properties: Arc::new(PropertyTable::aurora()),
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            observer: Arc::new(TracingProgress),
        }
    }

    /// Open the configured endpoint and wrap it
    pub async fn connect(config: &AbcConfig) -> Result<Self> {
        let link = AbcLink::connect(config).await?;
        Ok(Self::new(link).with_progress_interval(config.progress_interval()))
    }

    pub fn with_properties(mut self, properties: PropertyTable) -> Self {
        self.properties = Arc::new(properties);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    /// Raw register values for `query`, in request order
    pub async fn fetch(&self, query: &Query, options: FetchOptions) -> Result<RegisterSnapshot> {
        let strict = query.is_strict();
        let chunks = plan(query.resolve(&self.registry), self.registry.breakpoints());
        debug!(
            "Fetching '{}' in {} chunks (strict: {}, exhaustive: {})",
            query,
            chunks.len(),
            strict,
            options.exhaustive
        );

        let started = Instant::now();
        let mut throttle = ProgressThrottle::starting_at(self.progress_interval, started);
        let mut gathered = Gathered::default();
        for (i, chunk) in chunks.iter().enumerate() {
            self.fetch_chunk(chunk, strict, options, &mut gathered).await?;

            if throttle.ready() {
                self.observer.on_progress(&FetchProgress {
                    chunks_done: i + 1,
                    chunks_total: chunks.len(),
                    registers_read: gathered.values.len(),
                    elapsed: started.elapsed(),
                });
            }
        }

        Ok(RegisterSnapshot::from_raw(
            query
                .ordered_addresses(&self.registry)
                .into_iter()
                .filter_map(|addr| gathered.values.get(&addr).map(|v| (addr, *v))),
        ))
    }

    /// [`fetch`](Self::fetch) followed by decoding
    pub async fn fetch_decoded(
        &self,
        query: &Query,
        options: FetchOptions,
    ) -> Result<RegisterSnapshot> {
        let raw = self.fetch(query, options).await?;
        Ok(registers::decode(&self.registry, &raw))
    }

    async fn read(&self, spans: &[Span]) -> Result<(Vec<u16>, Vec<u16>)> {
        let request = Request::for_spans(spans);
        let addresses = request.read_addresses();
        let response = self.link.lock().await.execute(&request).await?;
        match response {
            Response::Registers(values) => Ok((addresses, values)),
            other => Err(AbcError::malformed(format!(
                "unexpected {:?} for {}",
                other, request
            ))),
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &Chunk,
        strict: bool,
        options: FetchOptions,
        gathered: &mut Gathered,
    ) -> Result<()> {
        let error = match self.read(chunk.spans()).await {
            Ok((addresses, values)) => {
                gathered.merge(&addresses, values);
                return Ok(());
            }
            Err(e) => e,
        };
        if strict || !self.recoverable(&error, options) {
            return Err(error);
        }

        if let [span] = chunk.spans() {
            return self.span_failed(*span, error, options, gathered).await;
        }
        warn!("Chunk {} failed ({}), retrying span by span", chunk, error);
        for span in chunk.spans() {
            match self.read(std::slice::from_ref(span)).await {
                Ok((addresses, values)) => gathered.merge(&addresses, values),
                Err(e) if self.recoverable(&e, options) => {
                    self.span_failed(*span, e, options, gathered).await?
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Rejections are always recoverable in implicit queries, timeouts only
    /// when probing exhaustively
    fn recoverable(&self, error: &AbcError, options: FetchOptions) -> bool {
        error.is_rejection() || (options.exhaustive && error.is_timeout())
    }

    async fn span_failed(
        &self,
        span: Span,
        error: AbcError,
        options: FetchOptions,
        gathered: &mut Gathered,
    ) -> Result<()> {
        if error.is_timeout() && !span.is_range() {
            return Err(error);
        }
        if !(options.exhaustive && span.is_range()) {
            debug!("Omitting {}: {}", span, error);
            return Ok(());
        }

        warn!("Span {} failed ({}), probing each register", span, error);
        for address in span.addresses() {
            match self.read(&[Span::Single(address)]).await {
                Ok((addresses, values)) => gathered.merge(&addresses, values),
                Err(e) if e.is_rejection() => debug!("Omitting {}: {}", address, e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn check_writable(&self, address: u16) -> Result<()> {
        if !self.registry.is_writable(address) {
            return Err(AbcError::validation(format!(
                "register {} is not writable",
                address
            )));
        }
        Ok(())
    }

    /// Write one raw value with FC 6
    pub async fn write(&self, address: u16, value: u16) -> Result<()> {
        self.check_writable(address)?;
        let request = Request::WriteSingleRegister { address, value };
        self.link.lock().await.execute(&request).await?;
        info!("Wrote {} to register {}", value, address);
        Ok(())
    }

    /// Write discontiguous raw values in one FC 67 transaction
    pub async fn write_many(&self, writes: &[(u16, u16)]) -> Result<()> {
        for (address, _) in writes {
            self.check_writable(*address)?;
        }
        let request = Request::WriteRegisters(writes.to_vec());
        self.link.lock().await.execute(&request).await?;
        info!("Wrote {} registers", writes.len());
        Ok(())
    }

    /// Validate, encode and write one named property, returning the raw
    /// value written
    pub async fn write_property(&self, name: &str, setting: &Setting) -> Result<u16> {
        let property = self
            .properties
            .get(name)
            .ok_or_else(|| AbcError::validation(format!("unknown property '{}'", name)))?;
        let encoded = property.encode(setting)?;
        self.check_writable(property.address)?;

        // read-modify-write stays under one lock
        let mut link = self.link.lock().await;
        let value = if encoded.needs_current() {
            let read = Request::ReadRegisters(vec![property.address]);
            match link.execute(&read).await? {
                Response::Registers(values) if values.len() == 1 => encoded.apply(values[0]),
                other => {
                    return Err(AbcError::malformed(format!(
                        "unexpected {:?} for {}",
                        other, read
                    )))
                }
            }
        } else {
            encoded.apply(0)
        };

        let request = Request::WriteSingleRegister {
            address: property.address,
            value,
        };
        if let Err(e) = link.execute(&request).await {
            warn!("Setting {} to {} failed: {}", name, setting, e);
            return Err(e);
        }
        info!(
            "Set {} to {} (register {} = {})",
            name, setting, property.address, value
        );
        Ok(value)
    }

    /// Opaque FC 68 exchange, returning the status byte
    pub async fn diagnostic(&self, first: u16, second: u16) -> Result<u8> {
        let request = Request::Diagnostic(first, second);
        match self.link.lock().await.execute(&request).await? {
            Response::Diagnostic(status) => Ok(status),
            other => Err(AbcError::malformed(format!(
                "unexpected {:?} for {}",
                other, request
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::transport::MockDevice;
    use parking_lot::Mutex as SyncMutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Recorder {
        seen: SyncMutex<Vec<FetchProgress>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, progress: &FetchProgress) {
            self.seen.lock().push(progress.clone());
        }
    }

    fn executor(device: &MockDevice, registry: Registry) -> QueryExecutor {
        let link = AbcLink::new(device.clone()).with_timeout(Duration::from_millis(20));
        QueryExecutor::with_registry(link, Arc::new(registry))
    }

    #[test]
    fn test_throttle_interval() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::starting_at(Duration::from_secs(5), start);
        assert!(!throttle.ready_at(start + Duration::from_secs(1)));
        assert!(throttle.ready_at(start + Duration::from_secs(5)));
        assert!(!throttle.ready_at(start + Duration::from_secs(6)));
        assert!(!throttle.ready_at(start + Duration::from_millis(9_999)));
        assert!(throttle.ready_at(start + Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_progress_reported_per_chunk_without_interval() {
        let device = MockDevice::new(1);
        let registry = Registry::new().with_valid_ranges([0..=149, 200..=209]);
        let recorder = Arc::new(Recorder::default());
        let executor = executor(&device, registry)
            .with_progress_interval(Duration::ZERO)
            .with_observer(recorder.clone());

        let raw = executor
            .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(raw.len(), 160);

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].chunks_done, 2);
        assert_eq!(seen[1].chunks_total, 2);
        assert_eq!(seen[1].registers_read, 160);
    }

    #[tokio::test]
    async fn test_progress_throttled() {
        let device = MockDevice::new(1);
        let recorder = Arc::new(Recorder::default());
        let executor = executor(&device, Registry::new().with_valid_ranges([0..=999]))
            .with_observer(recorder.clone());

        executor
            .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(device.request_count(), 10);
        assert!(recorder.seen.lock().is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_omitted_span_logged() {
        let device = MockDevice::new(1).reject([5]);
        let registry = Registry::new()
            .with_valid_ranges([0..=9])
            .with_breakpoints(&[5, 6]);
        let executor = executor(&device, registry);

        let raw = executor
            .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(raw.len(), 9);
        assert!(!raw.contains(5));
        assert!(logs_contain("Omitting 5"));
    }

    #[tokio::test]
    async fn test_single_span_chunk_not_retried_twice() {
        let device = MockDevice::new(1).reject([3]);
        let executor = executor(&device, Registry::new().with_valid_ranges([0..=9]));

        let raw = executor
            .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
            .await
            .unwrap();
        assert!(raw.is_empty());
        assert_eq!(device.request_count(), 1);
    }

    #[tokio::test]
    async fn test_diagnostic_status() {
        let device = MockDevice::new(1);
        let executor = executor(&device, Registry::new());
        assert_eq!(executor.diagnostic(0x0001, 0xBEEF).await.unwrap(), 0);
        assert_eq!(device.function_codes(), vec![0x44]);
    }
}
