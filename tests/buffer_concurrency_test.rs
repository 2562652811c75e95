//! Concurrency tests for the record buffer under many producers.

use std::sync::Arc;
use std::thread;

use sinkcheck::services::ListenerRegistry;
use sinkcheck::{DefaultTrigger, FinishAtCount, InstanceId, RecordBuffer, VerificationFailure};

const PRODUCERS: u64 = 8;
const PER_PRODUCER: u64 = 1_000;

fn accept(_: &[(u64, u64)]) -> Result<(), VerificationFailure> {
    Ok(())
}

fn registry_with(
    instances: usize,
) -> (Arc<RecordBuffer<(u64, u64)>>, ListenerRegistry<(u64, u64)>, Vec<InstanceId>) {
    let buffer = Arc::new(RecordBuffer::new());
    let registry = ListenerRegistry::new(Arc::clone(&buffer));
    let ids = (0..instances)
        .map(|_| {
            registry
                .register(Arc::new(accept), Arc::new(DefaultTrigger))
                .unwrap()
        })
        .collect();
    (buffer, registry, ids)
}

#[test]
fn test_parallel_producers_keep_their_own_order() {
    let (buffer, _registry, ids) = registry_with(2);

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let buffer = Arc::clone(&buffer);
            let ids = ids.clone();
            thread::spawn(move || {
                for n in 0..PER_PRODUCER {
                    let id = ids[(producer % 2) as usize];
                    assert!(buffer.append(id, (producer, n)).is_stored());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut total = 0;
    for id in &ids {
        let tagged = buffer.tagged_records_for(*id);
        total += tagged.len() as u64;

        // Sequence numbers are dense and in arrival order.
        for (expected, record) in tagged.iter().enumerate() {
            assert_eq!(record.sequence, expected as u64);
            assert_eq!(record.instance_id, *id);
        }

        // Records of each producer appear in the order it emitted them.
        for producer in 0..PRODUCERS {
            let values: Vec<u64> = tagged
                .iter()
                .filter(|record| record.payload.0 == producer)
                .map(|record| record.payload.1)
                .collect();
            if values.is_empty() {
                continue;
            }
            assert_eq!(values, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
}

#[test]
fn test_count_trigger_stores_exactly_limit_under_contention() {
    let buffer = Arc::new(RecordBuffer::new());
    let registry = ListenerRegistry::new(Arc::clone(&buffer));
    let id = registry
        .register(Arc::new(accept), Arc::new(FinishAtCount::new(500)))
        .unwrap();

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                (0..PER_PRODUCER)
                    .filter(|n| buffer.append(id, (producer, *n)).is_stored())
                    .count()
            })
        })
        .collect();
    let stored: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(stored, 500);
    assert_eq!(buffer.record_count(id), 500);
    let summary = buffer.summary(id).unwrap();
    assert!(summary.finished);
    assert_eq!(summary.late_records, PRODUCERS * PER_PRODUCER - 500);
}

#[test]
fn test_sealing_mid_stream_freezes_contents() {
    let (buffer, _registry, ids) = registry_with(1);
    let id = ids[0];

    for n in 0..10 {
        buffer.append(id, (0, n));
    }
    buffer.seal();

    let handles: Vec<_> = (0..4)
        .map(|producer| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for n in 0..100 {
                    assert!(!buffer.append(id, (producer, n)).is_stored());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(buffer.record_count(id), 10);
    assert_eq!(buffer.summary(id).unwrap().late_records, 400);
}
