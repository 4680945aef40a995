//! Circular index arithmetic.
//!
//! All ranges are inclusive on both ends and may wrap: `from > to` means the
//! range runs from `from` to the end of the buffer and continues at `0`.
//! Functions return `None` for out-of-range input instead of panicking.

/// Number of samples in the inclusive circular range `[from, to]`.
///
/// A range with `from == to + 1` (mod `size`) covers the whole buffer.
pub fn compute_sub_length(from: usize, to: usize, size: usize) -> Option<usize> {
    if size == 0 || from >= size || to >= size {
        return None;
    }
    if to >= from {
        Some(to - from + 1)
    } else {
        Some(to + size - from + 1)
    }
}

/// Start of the circular range of `sub_length` samples ending at `to`.
pub fn compute_from_index(to: usize, sub_length: usize, size: usize) -> Option<usize> {
    if size == 0 || sub_length == 0 || sub_length > size || to >= size {
        return None;
    }
    Some((to + size + 1 - sub_length) % size)
}

/// End of the circular range of `sub_length` samples starting at `from`.
pub fn compute_to_index(from: usize, sub_length: usize, size: usize) -> Option<usize> {
    if size == 0 || sub_length == 0 || sub_length > size || from >= size {
        return None;
    }
    Some((from + sub_length - 1) % size)
}

/// Whether `query` lies inside the inclusive circular range `[start, end]`.
#[inline]
pub fn is_inside_bounds(query: usize, start: usize, end: usize, size: usize) -> bool {
    if query >= size {
        false
    } else if start <= end {
        query >= start && query <= end
    } else {
        query <= end || query >= start
    }
}

/// Copy `new_length` samples out of `ring` starting at `from`, wrapping at the end.
///
/// When `new_length` exceeds the ring length the tail is zero-filled.
pub fn ring_array_copy(ring: &[f64], from: usize, new_length: usize) -> Vec<f64> {
    let mut copy = vec![0.0; new_length];
    if ring.is_empty() {
        return copy;
    }
    let from = from % ring.len();
    let length = new_length.min(ring.len());
    let first = (ring.len() - from).min(length);
    copy[..first].copy_from_slice(&ring[from..from + first]);
    copy[first..length].copy_from_slice(&ring[..length - first]);
    copy
}
