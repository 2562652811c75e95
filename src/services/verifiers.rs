//! Ready-made output verifiers.
//!
//! Closures of the shape `Fn(&[T]) -> Result<(), VerificationFailure>` are
//! verifiers on their own; the types here cover the common expectations.

use std::fmt::Debug;

use crate::domain::ports::{OutputVerifier, VerificationFailure};

/// How [`ExpectedRecords`] compares the output to the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Same records, same order, nothing else.
    #[default]
    Exactly,
    /// Expected records appear in this relative order; others may be interleaved.
    InOrder,
    /// Every expected record appears, in any order; extra records are allowed.
    ContainsAll,
    /// Every expected record appears and nothing else does, in any order.
    ContainsOnly,
}

/// Compares an instance's output against a list of expected records.
#[derive(Debug, Clone)]
pub struct ExpectedRecords<T> {
    expected: Vec<T>,
    mode: MatchMode,
}

impl<T> ExpectedRecords<T>
where
    T: PartialEq + Debug,
{
    pub fn new(expected: impl IntoIterator<Item = T>) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            mode: MatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn in_order(self) -> Self {
        self.with_mode(MatchMode::InOrder)
    }

    pub fn contains_all(self) -> Self {
        self.with_mode(MatchMode::ContainsAll)
    }

    pub fn contains_only(self) -> Self {
        self.with_mode(MatchMode::ContainsOnly)
    }

    fn check_exactly(&self, records: &[T]) -> Result<(), VerificationFailure> {
        if records.len() != self.expected.len() {
            return Err(VerificationFailure::new(format!(
                "expected {} records, got {}: {:?}",
                self.expected.len(),
                records.len(),
                records
            )));
        }
        match self
            .expected
            .iter()
            .zip(records)
            .position(|(expected, actual)| expected != actual)
        {
            Some(index) => Err(VerificationFailure::new(format!(
                "record {index} differs: expected {:?}, got {:?}",
                self.expected[index], records[index]
            ))),
            None => Ok(()),
        }
    }

    fn check_in_order(&self, records: &[T]) -> Result<(), VerificationFailure> {
        let mut remaining = records.iter();
        for (index, expected) in self.expected.iter().enumerate() {
            if !remaining.any(|actual| actual == expected) {
                return Err(VerificationFailure::new(format!(
                    "expected record {index} ({expected:?}) not found in order in {records:?}"
                )));
            }
        }
        Ok(())
    }

    /// Multiset matching: each output record can satisfy one expectation.
    fn unmatched<'a>(&'a self, records: &'a [T]) -> (Vec<&'a T>, Vec<&'a T>) {
        let mut used = vec![false; records.len()];
        let mut missing = Vec::new();
        for expected in &self.expected {
            let hit = records
                .iter()
                .enumerate()
                .find(|(index, actual)| !used[*index] && *actual == expected);
            match hit {
                Some((index, _)) => used[index] = true,
                None => missing.push(expected),
            }
        }
        let extra = records
            .iter()
            .zip(used)
            .filter(|(_, used)| !used)
            .map(|(record, _)| record)
            .collect();
        (missing, extra)
    }
}

impl<T> OutputVerifier<T> for ExpectedRecords<T>
where
    T: PartialEq + Debug + Send + Sync,
{
    fn verify(&self, records: &[T]) -> Result<(), VerificationFailure> {
        match self.mode {
            MatchMode::Exactly => self.check_exactly(records),
            MatchMode::InOrder => self.check_in_order(records),
            MatchMode::ContainsAll | MatchMode::ContainsOnly => {
                let (missing, extra) = self.unmatched(records);
                if !missing.is_empty() {
                    return Err(VerificationFailure::new(format!(
                        "missing expected records: {missing:?}"
                    )));
                }
                if self.mode == MatchMode::ContainsOnly && !extra.is_empty() {
                    return Err(VerificationFailure::new(format!(
                        "unexpected records: {extra:?}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Checks how many records an instance produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCount {
    min: usize,
    max: Option<usize>,
}

impl RecordCount {
    pub fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }
}

impl<T> OutputVerifier<T> for RecordCount {
    fn verify(&self, records: &[T]) -> Result<(), VerificationFailure> {
        let count = records.len();
        let within = count >= self.min && self.max.is_none_or(|max| count <= max);
        if within {
            return Ok(());
        }
        let expected = match self.max {
            Some(max) if max == self.min => format!("exactly {max}"),
            Some(max) => format!("between {} and {max}", self.min),
            None => format!("at least {}", self.min),
        };
        Err(VerificationFailure::new(format!(
            "expected {expected} records, got {count}"
        )))
    }
}
