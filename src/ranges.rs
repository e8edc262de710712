use crate::state::ByteRange;

/// Splits `[0, total_size - 1]` into `workers` contiguous ranges.
///
/// The last range absorbs the remainder of the integer division. With a
/// single worker the whole resource is one range. An unknown size (`0`)
/// yields one placeholder range `0-0`; callers stream those instead of
/// splitting them. More workers than bytes are clamped so no range is empty.
pub fn plan(total_size: u64, workers: usize) -> Vec<ByteRange> {
    let workers = (workers as u64).clamp(1, total_size.max(1));

    if workers == 1 || total_size == 0 {
        return vec![ByteRange::new(0, total_size.saturating_sub(1))];
    }

    let chunk_size = total_size / workers;
    let mut ranges = Vec::with_capacity(workers as usize);

    for i in 0..workers {
        let start = i * chunk_size;
        let end = if i == workers - 1 {
            total_size - 1
        } else {
            (i + 1) * chunk_size - 1
        };
        ranges.push(ByteRange::new(start, end));
    }

    ranges
}
