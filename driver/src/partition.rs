use crate::config::DatasetClasses;
use itertools::izip;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartitionError {
    #[error("cannot divide {total} units between {splits} splits")]
    InvalidSplits { total: usize, splits: usize },
}

/// shape of one dataset class as seen by the partitioner
#[derive(Debug, Clone, Copy)]
pub struct ClassShape {
    pub count: usize,
    pub shots_per_sample: usize,
}

/// slice of one class owned by a single writer
///
/// `first_dset`/`num_dsets` select a contiguous dataset range, `start`/`stride`
/// select which shots of those datasets this writer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassRange {
    pub first_dset: usize,
    pub num_dsets: usize,
    pub start: usize,
    pub stride: usize,
}

impl ClassRange {
    /// placeholder for a writer with nothing to do for a class
    pub const EMPTY: ClassRange = ClassRange {
        first_dset: 0,
        num_dsets: 0,
        start: 0,
        stride: 0,
    };
}

/// one writer's slice of every dataset class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriterAssignment {
    pub small: Option<ClassRange>,
    pub vlen: Option<ClassRange>,
    pub detector: Option<ClassRange>,
}

/// partition `total` indivisible units into `splits` groups differing in size
/// by at most one, larger groups first
///
/// returns (offsets, counts) with offsets[0] == 0 and sum(counts) == total
pub fn divide_evenly(
    total: usize,
    splits: usize,
) -> Result<(Vec<usize>, Vec<usize>), PartitionError> {
    if splits == 0 {
        return Err(PartitionError::InvalidSplits { total, splits });
    }

    let base = total / splits;
    let mut remainder = total % splits;
    let mut offsets = Vec::with_capacity(splits);
    let mut counts = Vec::with_capacity(splits);
    let mut next_offset = 0;

    for _ in 0..splits {
        let mut count = base;
        if remainder > 0 {
            count += 1;
            remainder -= 1;
        }
        offsets.push(next_offset);
        counts.push(count);
        next_offset += count;
    }

    debug_assert_eq!(next_offset, total);
    Ok((offsets, counts))
}

/// assign one class to `writer_count` writers
///
/// With at least as many datasets as writers each writer gets a contiguous
/// dataset range and writes every shot of it. With fewer datasets than writers
/// the writers are grouped per dataset and interleave its shots through
/// start/stride. An empty class assigns nothing.
pub fn partition_class(
    writer_count: usize,
    class: &ClassShape,
) -> Result<Vec<Option<ClassRange>>, PartitionError> {
    if writer_count == 0 {
        return Err(PartitionError::InvalidSplits {
            total: class.count,
            splits: 0,
        });
    }

    if class.count == 0 {
        return Ok(vec![None; writer_count]);
    }

    if class.count >= writer_count {
        let (offsets, counts) = divide_evenly(class.count, writer_count)?;

        Ok(izip!(offsets, counts)
            .map(|(offset, count)| {
                Some(ClassRange {
                    first_dset: offset,
                    num_dsets: count,
                    start: 0,
                    stride: class.shots_per_sample,
                })
            })
            .collect())
    } else {
        // every dataset gets a contiguous block of cooperating writers
        let (first_writers, writers_per_dset) = divide_evenly(writer_count, class.count)?;
        let mut ranges = vec![None; writer_count];

        for (dset, (first_writer, block)) in izip!(first_writers, writers_per_dset).enumerate() {
            for k in 0..block {
                ranges[first_writer + k] = Some(ClassRange {
                    first_dset: dset,
                    num_dsets: 1,
                    start: k * class.shots_per_sample,
                    stride: block * class.shots_per_sample,
                });
            }
        }

        Ok(ranges)
    }
}

/// build the full per-writer assignment table over all three classes
pub fn divide_between_writers(
    writer_count: usize,
    classes: &DatasetClasses,
) -> Result<Vec<WriterAssignment>, PartitionError> {
    let small = partition_class(writer_count, &classes.small.shape())?;
    let vlen = partition_class(writer_count, &classes.vlen.shape())?;
    let detector = partition_class(writer_count, &classes.detector.shape())?;

    Ok(izip!(small, vlen, detector)
        .map(|(small, vlen, detector)| WriterAssignment {
            small,
            vlen,
            detector,
        })
        .collect())
}
