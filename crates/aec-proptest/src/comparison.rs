//! Sample comparison utilities for checking streamed output.

use std::fmt;

use aec_common_audio::audio_util::deinterleave;

/// Result of comparing two i16 buffers.
#[derive(Debug)]
pub struct ComparisonResult {
    pub max_abs_diff: i32,
    pub max_abs_diff_index: usize,
    pub mismatches: usize,
    pub total: usize,
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_abs_diff={} (at index {}), mismatches={}/{}",
            self.max_abs_diff, self.max_abs_diff_index, self.mismatches, self.total,
        )
    }
}

/// Compare two i16 slices, returning detailed statistics.
pub fn compare_i16(actual: &[i16], expected: &[i16], tolerance: i32) -> ComparisonResult {
    assert_eq!(actual.len(), expected.len(), "Length mismatch");
    let mut max_abs_diff = 0;
    let mut max_abs_diff_index = 0;
    let mut mismatches = 0;

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        let diff = (i32::from(a) - i32::from(e)).abs();
        if diff > max_abs_diff {
            max_abs_diff = diff;
            max_abs_diff_index = i;
        }
        if diff > tolerance {
            mismatches += 1;
        }
    }

    ComparisonResult {
        max_abs_diff,
        max_abs_diff_index,
        mismatches,
        total: actual.len(),
    }
}

/// Assert two i16 slices are equal within an absolute tolerance in LSBs.
pub fn assert_i16_near(actual: &[i16], expected: &[i16], tolerance: i32) {
    let result = compare_i16(actual, expected, tolerance);
    assert!(
        result.mismatches == 0,
        "i16 comparison failed: {result}\n  actual[{}]={}, expected[{}]={}",
        result.max_abs_diff_index,
        actual[result.max_abs_diff_index],
        result.max_abs_diff_index,
        expected[result.max_abs_diff_index],
    );
}

/// Assert two i16 slices are bit-exact.
pub fn assert_i16_exact(actual: &[i16], expected: &[i16]) {
    assert_eq!(actual.len(), expected.len(), "Length mismatch");
    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(a, e, "Mismatch at index {i}: actual={a}, expected={e}");
    }
}

/// Split an interleaved buffer into one vector per channel.
pub fn split_channels(interleaved: &[i16], channels: usize) -> Vec<Vec<i16>> {
    let frames = interleaved.len() / channels;
    let mut out = vec![vec![0; frames]; channels];
    let mut tables: Vec<&mut [i16]> = out.iter_mut().map(Vec::as_mut_slice).collect();
    deinterleave(interleaved, frames, &mut tables);
    out
}
