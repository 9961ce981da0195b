use crate::partition::{
    divide_between_writers, divide_evenly, partition_class, ClassRange, ClassShape, PartitionError,
};
use crate::testutil::sample_config;

#[test]
fn divide_evenly_rejects_zero_splits() {
    assert_eq!(
        divide_evenly(11, 0),
        Err(PartitionError::InvalidSplits {
            total: 11,
            splits: 0
        })
    );
}

#[test]
fn divide_evenly_example() {
    let (offsets, counts) = divide_evenly(11, 3).unwrap();

    assert_eq!(offsets, vec![0, 4, 8]);
    assert_eq!(counts, vec![4, 4, 3]);
}

#[test]
fn divide_evenly_partitions_for_all_small_inputs() {
    for total in 0..40 {
        for splits in 1..12 {
            let (offsets, counts) = divide_evenly(total, splits).unwrap();

            assert_eq!(offsets.len(), splits);
            assert_eq!(counts.len(), splits);
            assert_eq!(counts.iter().sum::<usize>(), total);

            let floor = total / splits;
            let larger = total % splits;
            for (position, count) in counts.iter().enumerate() {
                let expected = if position < larger { floor + 1 } else { floor };
                assert_eq!(
                    *count, expected,
                    "total={total} splits={splits} position={position}"
                );
            }

            assert_eq!(offsets[0], 0);
            for i in 1..splits {
                assert_eq!(offsets[i], offsets[i - 1] + counts[i - 1]);
            }
            assert_eq!(offsets[splits - 1] + counts[splits - 1], total);
        }
    }
}

#[test]
fn partition_class_rejects_zero_writers() {
    let class = ClassShape {
        count: 4,
        shots_per_sample: 1,
    };

    assert!(partition_class(0, &class).is_err());
}

#[test]
fn empty_class_assigns_nothing() {
    let class = ClassShape {
        count: 0,
        shots_per_sample: 1,
    };

    assert_eq!(partition_class(3, &class).unwrap(), vec![None, None, None]);
}

#[test]
fn split_mode_example() {
    // 10 datasets over 3 writers, every dataset written in full
    let class = ClassShape {
        count: 10,
        shots_per_sample: 1,
    };
    let ranges = partition_class(3, &class).unwrap();

    let expected = [(0, 4), (4, 3), (7, 3)];
    for (writer, (first_dset, num_dsets)) in expected.into_iter().enumerate() {
        assert_eq!(
            ranges[writer],
            Some(ClassRange {
                first_dset,
                num_dsets,
                start: 0,
                stride: 1,
            })
        );
    }
}

#[test]
fn round_robin_mode_example() {
    // one dataset shared by 3 writers interleaving blocks of 100 shots
    let class = ClassShape {
        count: 1,
        shots_per_sample: 100,
    };
    let ranges = partition_class(3, &class).unwrap();

    for (writer, range) in ranges.iter().enumerate() {
        assert_eq!(
            *range,
            Some(ClassRange {
                first_dset: 0,
                num_dsets: 1,
                start: writer * 100,
                stride: 300,
            })
        );
    }
}

#[test]
fn round_robin_uneven_writer_blocks() {
    // 7 writers over 3 datasets: blocks of 3, 2 and 2 writers
    let class = ClassShape {
        count: 3,
        shots_per_sample: 2,
    };
    let ranges = partition_class(7, &class).unwrap();

    let expected = [
        (0, 0, 6),
        (0, 2, 6),
        (0, 4, 6),
        (1, 0, 4),
        (1, 2, 4),
        (2, 0, 4),
        (2, 2, 4),
    ];
    for (writer, (first_dset, start, stride)) in expected.into_iter().enumerate() {
        assert_eq!(
            ranges[writer],
            Some(ClassRange {
                first_dset,
                num_dsets: 1,
                start,
                stride,
            }),
            "writer {writer}"
        );
    }
}

// does `range` make this writer produce (dset, shot)?
//
// a writer produces, from each owned dataset, the shots_per_sample shots
// following start, then strides
fn covers(range: &ClassRange, shots_per_sample: usize, dset: usize, shot: usize) -> bool {
    if dset < range.first_dset || dset >= range.first_dset + range.num_dsets {
        return false;
    }
    if shot < range.start {
        return false;
    }

    (shot - range.start) % range.stride < shots_per_sample
}

fn assert_exact_cover(writer_count: usize, class: ClassShape, num_shots: usize) {
    let ranges = partition_class(writer_count, &class).unwrap();

    for dset in 0..class.count {
        for shot in 0..num_shots {
            let writers = ranges
                .iter()
                .flatten()
                .filter(|range| covers(range, class.shots_per_sample, dset, shot))
                .count();

            assert_eq!(
                writers, 1,
                "(dset={dset}, shot={shot}) covered by {writers} writers \
                 with count={} writers={writer_count}",
                class.count
            );
        }
    }
}

#[test]
fn every_shot_of_every_dataset_has_exactly_one_writer() {
    for (writer_count, count, shots_per_sample) in [
        (3, 10, 1),
        (3, 1, 100),
        (7, 3, 2),
        (5, 5, 3),
        (4, 6, 1),
        (6, 2, 7),
        (1, 1, 1),
    ] {
        let class = ClassShape {
            count,
            shots_per_sample,
        };
        assert_exact_cover(writer_count, class, shots_per_sample * 12 + 5);
    }
}

#[test]
fn assignment_table_combines_all_classes() {
    let config = sample_config();
    let writers = divide_between_writers(3, &config.writers.classes).unwrap();

    assert_eq!(writers.len(), 3);
    // writer 1 of the worked example
    assert_eq!(
        writers[1].small,
        Some(ClassRange {
            first_dset: 4,
            num_dsets: 3,
            start: 0,
            stride: 1,
        })
    );
    assert_eq!(
        writers[1].vlen,
        Some(ClassRange {
            first_dset: 1,
            num_dsets: 1,
            start: 0,
            stride: 1,
        })
    );
    assert_eq!(
        writers[1].detector,
        Some(ClassRange {
            first_dset: 0,
            num_dsets: 1,
            start: 100,
            stride: 300,
        })
    );
}
