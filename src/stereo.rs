//! The `stereo` module implements the lossless mid/side transform for
//! correlated stereo pairs.
//!
//! Mid/side coding rotates an (L, R) pair into a mid channel and a side
//! (difference) channel. For correlated material the side channel carries
//! far less energy than either input, which lowers the entropy seen by the
//! residual coder. Both directions are exact on two's-complement integers:
//! the halving shift is a floor division, and the forward transform stores
//! the un-halved difference, so no information is lost.

use num_traits::{PrimInt, Signed};

use super::{errors, Result};

/// Converts an (L, R) pair into (M, S) in place.
///
/// In order: `s = r - l`, then `m = l + (s >> 1)` (arithmetic shift). The
/// left slice holds the mid channel afterwards and the right slice the side
/// channel.
pub fn lr_to_ms<T: PrimInt + Signed>(left: &mut [T], right: &mut [T]) -> Result<()> {
    if left.len() != right.len() {
        return errors::invalid_argument_error("stereo channels must have equal length");
    }

    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        *r = *r - *l;
        *l = *l + (*r >> 1);
    }
    Ok(())
}

/// Converts an (M, S) pair back into (L, R) in place.
///
/// Exact inverse of [`lr_to_ms`]: `l = m - (s >> 1)`, then `r = s + l`.
pub fn ms_to_lr<T: PrimInt + Signed>(mid: &mut [T], side: &mut [T]) -> Result<()> {
    if mid.len() != side.len() {
        return errors::invalid_argument_error("stereo channels must have equal length");
    }

    for (m, s) in mid.iter_mut().zip(side.iter_mut()) {
        *m = *m - (*s >> 1);
        *s = *s + *m;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_forward() {
        let mut left = [10i32, -3, 7];
        let mut right = [4i32, -3, 9];

        lr_to_ms(&mut left, &mut right).unwrap();

        // side first: r - l, then mid: l + (side >> 1)
        assert_eq!(right, [-6, 0, 2]);
        assert_eq!(left, [7, -3, 8]);
    }

    #[test]
    fn test_ms_round_trip() {
        let orig_left = [10i32, -3, 7, 0, i16::MAX as i32, i16::MIN as i32];
        let orig_right = [4i32, -3, 9, -1, i16::MIN as i32, i16::MAX as i32];

        let mut left = orig_left;
        let mut right = orig_right;

        lr_to_ms(&mut left, &mut right).unwrap();
        ms_to_lr(&mut left, &mut right).unwrap();

        assert_eq!(left, orig_left);
        assert_eq!(right, orig_right);
    }

    #[test]
    fn test_ms_round_trip_i16() {
        let orig_left = [1i16, -2, 3, -4];
        let orig_right = [-1i16, 2, -3, 4];

        let mut left = orig_left;
        let mut right = orig_right;

        lr_to_ms(&mut left, &mut right).unwrap();
        ms_to_lr(&mut left, &mut right).unwrap();

        assert_eq!(left, orig_left);
        assert_eq!(right, orig_right);
    }

    #[test]
    fn test_ms_length_mismatch() {
        let mut left = [0i32; 4];
        let mut right = [0i32; 3];

        assert!(lr_to_ms(&mut left, &mut right).is_err());
        assert!(ms_to_lr(&mut left, &mut right).is_err());
    }
}
