use std::sync::Arc;

use proptest::prelude::*;
use sinkcheck::services::ListenerRegistry;
use sinkcheck::{DefaultTrigger, FinishAtCount, RecordBuffer, VerificationFailure};

fn accept(_: &[u32]) -> Result<(), VerificationFailure> {
    Ok(())
}

proptest! {
    /// Property: each instance sees exactly its own records, in append order
    #[test]
    fn prop_records_partitioned_by_instance(
        appends in prop::collection::vec((0usize..4, any::<u32>()), 0..200)
    ) {
        let buffer = Arc::new(RecordBuffer::new());
        let registry = ListenerRegistry::new(Arc::clone(&buffer));
        let ids: Vec<_> = (0..4)
            .map(|_| registry.register(Arc::new(accept), Arc::new(DefaultTrigger)).unwrap())
            .collect();

        for (slot, value) in &appends {
            buffer.append(ids[*slot], *value);
        }

        for (slot, id) in ids.iter().enumerate() {
            let expected: Vec<u32> = appends
                .iter()
                .filter(|(s, _)| *s == slot)
                .map(|(_, value)| *value)
                .collect();
            prop_assert_eq!(buffer.records_for(*id), expected);
        }
    }

    /// Property: a count trigger keeps a prefix of min(limit, appended) records
    #[test]
    fn prop_count_trigger_keeps_prefix(
        values in prop::collection::vec(any::<u32>(), 0..100),
        limit in 1usize..50
    ) {
        let buffer = Arc::new(RecordBuffer::new());
        let registry = ListenerRegistry::new(Arc::clone(&buffer));
        let id = registry
            .register(Arc::new(accept), Arc::new(FinishAtCount::new(limit)))
            .unwrap();

        for value in &values {
            buffer.append(id, *value);
        }

        let kept = values.len().min(limit);
        prop_assert_eq!(buffer.records_for(id), values[..kept].to_vec());
        prop_assert_eq!(buffer.is_finished(id), values.len() >= limit);
        let summary = buffer.summary(id).unwrap();
        prop_assert_eq!(summary.late_records as usize, values.len() - kept);
    }
}
