//! Channel widening and constrained flood-fill dilation over N-D boolean masks.

use std::collections::VecDeque;

use crate::cube::strides;

/// OR each element with its neighbours at `±1` along `axis`, wrapping at the
/// axis ends.
pub(crate) fn widen_along_axis(mask: &[bool], shape: &[usize], axis: usize) -> Vec<bool> {
    let size = shape[axis];
    if size < 2 {
        return mask.to_vec();
    }
    let stride = strides(shape)[axis];

    let mut widened = mask.to_vec();
    for (i, out) in widened.iter_mut().enumerate() {
        if *out {
            continue;
        }
        let position = (i / stride) % size;
        let base = i - position * stride;
        let prev = base + ((position + size - 1) % size) * stride;
        let next = base + ((position + 1) % size) * stride;
        *out = mask[prev] || mask[next];
    }
    widened
}

/// Grow `seed` through face-connected neighbours that are set in `allowed`,
/// repeating until nothing changes.
///
/// Seed elements are always kept, even outside `allowed`. Axes do not wrap.
pub(crate) fn propagate(seed: &[bool], allowed: &[bool], shape: &[usize]) -> Vec<bool> {
    debug_assert_eq!(seed.len(), allowed.len());
    let strides = strides(shape);
    let mut grown = seed.to_vec();
    let mut queue: VecDeque<usize> = seed
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect();

    while let Some(i) = queue.pop_front() {
        for (&stride, &size) in strides.iter().zip(shape) {
            let position = (i / stride) % size;
            if position > 0 {
                let j = i - stride;
                if allowed[j] && !grown[j] {
                    grown[j] = true;
                    queue.push_back(j);
                }
            }
            if position + 1 < size {
                let j = i + stride;
                if allowed[j] && !grown[j] {
                    grown[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }
    grown
}
