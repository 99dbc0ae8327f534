//! Fetch and fallback integration tests
//!
//! Runs the executor against the in-process ABC simulator:
//! - implicit queries degrading to per-span and per-register reads
//! - strict queries surfacing device errors unchanged
//! - timeout escalation rules
//! - concurrent callers sharing one link

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;
use std::time::Duration;

use aurora_abc::{
    AbcError, AbcLink, FetchOptions, MockDevice, Query, QueryExecutor, RegisterValue, Registry,
};

fn seeded_device() -> MockDevice {
    MockDevice::new(1).with_registers((100..=110).map(|a| (a, a * 10)))
}

fn executor(device: &MockDevice, registry: Registry) -> QueryExecutor {
    let link = AbcLink::new(device.clone())
        .with_timeout(Duration::from_millis(20))
        .with_read_retries(0);
    QueryExecutor::with_registry(link, Arc::new(registry))
}

/// Valid range 100..=110 split by breakpoints so one chunk holds three spans
fn split_registry() -> Registry {
    Registry::new()
        .with_valid_ranges([100..=110])
        .with_breakpoints(&[105, 106])
}

fn addresses(snapshot: &aurora_abc::RegisterSnapshot) -> Vec<u16> {
    snapshot.addresses().collect()
}

// ============================================================================
// Implicit queries
// ============================================================================

#[tokio::test]
async fn test_implicit_fetch_omits_rejected_register() {
    let device = seeded_device().reject([105]);
    let executor = executor(&device, split_registry());

    let raw = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
        .await
        .unwrap();

    let mut expected: Vec<u16> = (100..=104).collect();
    expected.extend(106..=110);
    assert_eq!(addresses(&raw), expected);
    assert_eq!(raw.raw(104), Some(1040));
    assert_eq!(raw.raw(106), Some(1060));

    // combined chunk, then 100..104, 105, 106..110
    assert_eq!(device.function_codes(), vec![0x41, 0x41, 0x42, 0x41]);
}

#[tokio::test]
async fn test_implicit_fetch_without_exhaustive_drops_whole_range() {
    let device = seeded_device().reject([105]);
    let executor = executor(&device, Registry::new().with_valid_ranges([100..=110]));

    let raw = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
        .await
        .unwrap();
    assert!(raw.is_empty());
}

#[tokio::test]
async fn test_exhaustive_fetch_probes_each_register() {
    let device = seeded_device().reject([105]);
    let executor = executor(&device, Registry::new().with_valid_ranges([100..=110]));

    let raw = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::exhaustive())
        .await
        .unwrap();

    assert_eq!(raw.len(), 10);
    assert!(!raw.contains(105));
    // one range read, then eleven single reads
    assert_eq!(device.request_count(), 12);
}

#[tokio::test]
async fn test_unsupported_function_probed_with_singles() {
    let device = seeded_device().disable_function(0x41);
    let registry = Registry::new()
        .with_valid_ranges([100..=104])
        .with_breakpoints(&[103]);
    let plain = executor(&device, registry);

    let raw = plain
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
        .await
        .unwrap();
    assert!(raw.is_empty());

    let device = seeded_device().disable_function(0x41);
    let registry = Registry::new()
        .with_valid_ranges([100..=104])
        .with_breakpoints(&[103]);
    let probing = executor(&device, registry);

    let raw = probing
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::exhaustive())
        .await
        .unwrap();
    assert_eq!(addresses(&raw), vec![100, 101, 102, 103, 104]);
    assert_eq!(
        device.function_codes(),
        vec![0x41, 0x41, 0x42, 0x42, 0x42, 0x41, 0x42, 0x42]
    );
}

#[tokio::test]
async fn test_mixed_query_is_implicit_and_keeps_request_order() {
    let device = seeded_device().reject([103]);
    let registry = Registry::new()
        .with_name(110, "Last")
        .with_name(103, "Rejected")
        .with_name(100, "First");
    let executor = executor(&device, registry);

    let raw = executor
        .fetch(&Query::parse("108,known,101").unwrap(), FetchOptions::exhaustive())
        .await
        .unwrap();
    assert_eq!(addresses(&raw), vec![108, 100, 110, 101]);
}

// ============================================================================
// Strict queries
// ============================================================================

#[tokio::test]
async fn test_strict_out_of_range_address() {
    assert!(matches!(
        Query::parse("99999"),
        Err(AbcError::IllegalDataAddress(_))
    ));
}

#[tokio::test]
async fn test_strict_fetch_propagates_rejection() {
    let device = seeded_device().reject([105]);
    let executor = executor(&device, Registry::new());

    let result = executor
        .fetch(&Query::parse("100..110").unwrap(), FetchOptions::exhaustive())
        .await;
    assert!(matches!(result, Err(AbcError::IllegalDataAddress(_))));
    assert_eq!(device.request_count(), 1);
}

#[tokio::test]
async fn test_strict_fetch_in_request_order() {
    let device = seeded_device();
    let executor = executor(&device, Registry::new());

    let raw = executor
        .fetch(&Query::addresses([107, 101, 109, 101]), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(addresses(&raw), vec![107, 101, 109]);
    assert_eq!(raw.raw(109), Some(1090));
    assert_eq!(device.function_codes(), vec![0x42]);
}

// ============================================================================
// Timeouts and malformed replies
// ============================================================================

#[tokio::test]
async fn test_timeout_fatal_without_exhaustive() {
    let device = seeded_device().silence([105]);
    let executor = executor(&device, Registry::new().with_valid_ranges([100..=110]));

    let result = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::default())
        .await;
    assert!(matches!(result, Err(AbcError::WireTimeout(_))));
}

#[tokio::test]
async fn test_timeout_on_single_register_fatal_when_exhaustive() {
    let device = seeded_device().silence([105]);
    let executor = executor(&device, Registry::new().with_valid_ranges([100..=110]));

    let result = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::exhaustive())
        .await;
    assert!(matches!(result, Err(AbcError::WireTimeout(_))));
    // range timed out, probing reached 105 and stopped there
    assert_eq!(device.request_count(), 7);
}

#[tokio::test]
async fn test_timeout_recovered_by_retry() {
    let device = seeded_device().drop_replies(1);
    let link = AbcLink::new(device.clone())
        .with_timeout(Duration::from_millis(20))
        .with_read_retries(2);
    let executor = QueryExecutor::with_registry(link, Arc::new(Registry::new()));

    let raw = executor
        .fetch(&Query::parse("100..102").unwrap(), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(device.request_count(), 2);
}

#[tokio::test]
async fn test_malformed_reply_always_fatal() {
    let device = seeded_device().corrupt_replies(true);
    let executor = executor(&device, Registry::new().with_valid_ranges([100..=110]));

    let result = executor
        .fetch(&Query::parse("valid").unwrap(), FetchOptions::exhaustive())
        .await;
    assert!(matches!(result, Err(AbcError::MalformedResponse(_))));
    assert_eq!(device.request_count(), 1);
}

// ============================================================================
// Decoding and sharing
// ============================================================================

#[tokio::test]
async fn test_fetch_decoded_with_aurora_registry() {
    let device = MockDevice::new(1).with_registers([(19, 0xFFCE), (745, 685), (1146, 1), (1147, 2)]);
    let link = AbcLink::new(device.clone()).with_timeout(Duration::from_millis(20));
    let executor = QueryExecutor::new(link);

    let decoded = executor
        .fetch_decoded(&Query::parse("745,19,1146..1147").unwrap(), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(decoded.get(745), Some(&RegisterValue::Number(68.5)));
    assert_eq!(decoded.get(19), Some(&RegisterValue::Number(-5.0)));
    assert_eq!(decoded.get(1146), Some(&RegisterValue::Integer(0x0001_0002)));
}

#[tokio::test]
async fn test_concurrent_fetches_share_link() {
    let device = seeded_device();
    let executor = executor(&device, Registry::new());

    let mut handles = Vec::new();
    for start in [100u16, 103, 106] {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let query = Query::addresses(start..start + 3);
            executor.fetch(&query, FetchOptions::default()).await
        }));
    }

    for (handle, start) in handles.into_iter().zip([100u16, 103, 106]) {
        let raw = handle.await.unwrap().unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.raw(start), Some(start * 10));
    }
    assert_eq!(device.request_count(), 3);
}
