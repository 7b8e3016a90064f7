use std::ops::Range;

use super::PipelineError;

/// Partition of `0..len` into contiguous batches of `batch_size` (the last may be shorter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    len: usize,
    batches: Vec<Range<usize>>,
}

impl BatchPlan {
    pub fn new(len: usize, batch_size: usize) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batch size must be at least 1".into(),
            ));
        }
        let batches = (0..len)
            .step_by(batch_size)
            .map(|start| start..(start + batch_size).min(len))
            .collect();
        Ok(Self { len, batches })
    }

    pub fn batches(&self) -> &[Range<usize>] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Check that the batches concatenate back to exactly `0..len`.
    pub fn verify(&self) -> Result<(), PipelineError> {
        let mut next = 0;
        for (i, batch) in self.batches.iter().enumerate() {
            if batch.start != next || batch.is_empty() {
                return Err(PipelineError::InvariantViolation(format!(
                    "batch {i} ({batch:?}) does not continue at index {next}"
                )));
            }
            next = batch.end;
        }
        if next != self.len {
            return Err(PipelineError::InvariantViolation(format!(
                "batches cover {next} of {} units",
                self.len
            )));
        }
        Ok(())
    }
}
