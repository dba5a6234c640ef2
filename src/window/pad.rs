// Pad module - extending sample data to a longer length

use serde::{Deserialize, Serialize};

use crate::error::WindowError;

/// Policy for filling samples beyond the end of the original data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadType {
    /// Append zeros
    ZeroPad,
    /// Append copies of the data, cycling from its start
    DuplicatePad,
    /// Growth is not supported
    NoPad,
}

/// Extend `data` to `new_len` values according to `pad_type`.
///
/// The first `data.len()` values are copied unchanged. A `new_len` shorter
/// than the data truncates. `NoPad` growth is an `UnsupportedOperation`;
/// duplicating empty data into a non-empty result is an `InvalidArgument`.
pub fn pad(data: &[f64], new_len: usize, pad_type: PadType) -> Result<Vec<f64>, WindowError> {
    pad_frames(data, 1, new_len, pad_type, &[0.0])
}

/// Frame-wise [`pad`] over `data` made of `frame_width`-wide frames.
///
/// Zero padding appends copies of `silence`, which must be one frame wide.
/// Existing frames are copied bit for bit, so encoded samples keep their
/// exact bytes.
pub fn pad_frames<T: Copy>(
    data: &[T],
    frame_width: usize,
    new_frames: usize,
    pad_type: PadType,
    silence: &[T],
) -> Result<Vec<T>, WindowError> {
    let width = frame_width.max(1);
    let frames = data.len() / width;
    let data = &data[..frames * width];
    let new_len = new_frames * width;
    if new_frames <= frames {
        return Ok(data[..new_len].to_vec());
    }

    match pad_type {
        PadType::ZeroPad => {
            if silence.len() != width {
                return Err(WindowError::invalid(format!(
                    "silence frame has {} values, frames have {}",
                    silence.len(),
                    width
                )));
            }
            let mut padded = Vec::with_capacity(new_len);
            padded.extend_from_slice(data);
            for _ in frames..new_frames {
                padded.extend_from_slice(silence);
            }
            Ok(padded)
        }
        PadType::DuplicatePad => {
            if data.is_empty() {
                return Err(WindowError::invalid(
                    "cannot duplicate-pad an empty sample sequence",
                ));
            }
            Ok(data.iter().copied().cycle().take(new_len).collect())
        }
        PadType::NoPad => Err(WindowError::unsupported(format!(
            "padding from {} to {} samples with NoPad",
            frames, new_frames
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_pad() {
        let data = [1.0, 2.0, 3.0];
        let padded = pad(&data, 7, PadType::ZeroPad).unwrap();
        assert_eq!(&padded[..3], &data);
        assert!(padded[3..].iter().all(|&v| v == 0.0));
        assert_eq!(padded.len(), 7);
    }

    #[test]
    fn test_duplicate_pad_cycles() {
        let data = [1.0, 2.0, 3.0];
        let padded = pad(&data, 10, PadType::DuplicatePad).unwrap();
        for (i, &v) in padded.iter().enumerate() {
            assert_eq!(v, data[i % data.len()]);
        }
    }

    #[test]
    fn test_no_pad_growth_is_unsupported() {
        let err = pad(&[1.0], 2, PadType::NoPad).unwrap_err();
        assert!(matches!(err, WindowError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_no_growth_needs_no_policy() {
        assert_eq!(pad(&[1.0, 2.0], 2, PadType::NoPad).unwrap(), vec![1.0, 2.0]);
        assert_eq!(pad(&[1.0, 2.0], 1, PadType::ZeroPad).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_frames_pad_whole_frames() {
        let bytes = [1u8, 2, 3, 4];
        let zero = pad_frames(&bytes, 2, 4, PadType::ZeroPad, &[9, 9]).unwrap();
        assert_eq!(zero, vec![1, 2, 3, 4, 9, 9, 9, 9]);

        let duplicated = pad_frames(&bytes, 2, 3, PadType::DuplicatePad, &[0, 0]).unwrap();
        assert_eq!(duplicated, vec![1, 2, 3, 4, 1, 2]);

        let truncated = pad_frames(&bytes, 2, 1, PadType::NoPad, &[0, 0]).unwrap();
        assert_eq!(truncated, vec![1, 2]);
    }

    #[test]
    fn test_frames_reject_wrong_silence_width() {
        let err = pad_frames(&[1u8, 2], 2, 2, PadType::ZeroPad, &[0]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_duplicate_pad_empty_data() {
        let err = pad(&[], 4, PadType::DuplicatePad).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(pad(&[], 0, PadType::DuplicatePad).unwrap().is_empty());
    }
}
