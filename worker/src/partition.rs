use std::ops::Range;

/// Splits `total` tasks into contiguous chunks of `ceil(total / workers)` tasks, in order.
/// Only non-empty chunks are returned, so fewer than `workers` ranges come back when there
/// isn't enough work for everyone.
///
/// # Arguments
/// * `total` - The length of the task list.
/// * `workers` - The maximum amount of workers.
///
/// # Returns
/// The task index range of each worker to start.
pub fn chunk_ranges(total: usize, workers: usize) -> Vec<Range<usize>> {
    if total == 0 || workers == 0 {
        return Vec::new();
    }

    let chunk = total.div_ceil(workers);

    (0..workers)
        .map(|i| (i * chunk).min(total)..((i + 1) * chunk).min(total))
        .take_while(|range| !range.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_split() {
        assert_eq!(chunk_ranges(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn idle_workers_are_not_started() {
        assert_eq!(chunk_ranges(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(chunk_ranges(5, 4), vec![0..2, 2..4, 4..5]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    #[test]
    fn covers_every_task_once() {
        for total in 0..40 {
            for workers in 1..10 {
                let ranges = chunk_ranges(total, workers);
                let covered: Vec<_> = ranges.iter().cloned().flatten().collect();

                assert_eq!(covered, (0..total).collect::<Vec<_>>());
                assert!(ranges.len() <= workers);
            }
        }
    }
}
