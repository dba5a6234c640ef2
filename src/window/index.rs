// Index module - time/sample index arithmetic shared by every window
//
// All sample counts derive from one formula, floor(duration * rate / 1000),
// with the product snapped to the nearest integer when it is within rounding
// noise of it. Sizing, index upper bounds, padding lengths and independent
// data validation all go through `sample_count`/`span_sample_count`.

/// Absolute snap tolerance, in samples
const SNAP_ABSOLUTE: f64 = 1e-6;

/// Relative snap tolerance
const SNAP_RELATIVE: f64 = 1e-9;

/// Segments shorter than this are dropped by `split_on_time`
pub const MIN_SPLIT_SAMPLES: usize = 3;

/// Floor of `x`, treating values within rounding noise of an integer as that integer.
pub fn snapped_floor(x: f64) -> f64 {
    snapped_floor_with(x, 0.0)
}

fn snapped_floor_with(x: f64, extra_tolerance: f64) -> f64 {
    let nearest = x.round();
    let tolerance = SNAP_ABSOLUTE
        .max(SNAP_RELATIVE * x.abs())
        .max(extra_tolerance);
    if (x - nearest).abs() <= tolerance {
        nearest
    } else {
        x.floor()
    }
}

fn to_count(x: f64) -> usize {
    if x.is_finite() && x > 0.0 {
        x as usize
    } else {
        0
    }
}

/// Number of logical samples spanned by `duration_msec` at `rate` samples/sec.
pub fn sample_count(duration_msec: f64, rate: f64) -> usize {
    to_count(snapped_floor(duration_msec * rate / 1000.0))
}

/// Sample count of the span `[start_msec, end_msec]`.
///
/// Same formula as [`sample_count`], but the snap tolerance also covers the
/// rounding of `end - start` for large absolute times (e.g. epoch timestamps).
pub fn span_sample_count(start_msec: f64, end_msec: f64, rate: f64) -> usize {
    let magnitude = start_msec.abs().max(end_msec.abs()) * rate / 1000.0;
    let subtraction_noise = 8.0 * f64::EPSILON * magnitude;
    to_count(snapped_floor_with(
        (end_msec - start_msec) * rate / 1000.0,
        subtraction_noise,
    ))
}

/// True when two durations of windows starting near `start_msec` are equal up to rounding.
pub fn same_duration(a: f64, b: f64, start_msec: f64) -> bool {
    let magnitude = start_msec.abs().max((start_msec + a).abs()).max(1.0);
    (a - b).abs() <= 8.0 * f64::EPSILON * magnitude
}

/// Millisecond offset of logical sample `index`.
pub fn offset_msec(index: usize, rate: f64) -> f64 {
    1000.0 * index as f64 / rate
}

/// Convert an offset into a logical sample index.
///
/// Lower bounds round to nearest (+0.5 bias) and clamp to `max_index`;
/// upper bounds (exclusive) truncate. The asymmetry assigns a boundary
/// sample shared by adjacent windows to exactly one of them.
/// Returns `None` for offsets outside `[0, duration_msec]`, and for lower
/// bounds of a window with no samples.
pub fn index_of(
    offset_msec: f64,
    duration_msec: f64,
    rate: f64,
    max_index: Option<usize>,
    is_lower_bound: bool,
) -> Option<usize> {
    if !(0.0..=duration_msec).contains(&offset_msec) {
        return None;
    }

    let position = offset_msec * rate / 1000.0;
    if is_lower_bound {
        let index = (position + 0.5).floor() as usize;
        max_index.map(|max| index.min(max))
    } else {
        Some(snapped_floor(position) as usize)
    }
}

/// Largest valid lower-bound index, `None` for an empty window.
pub fn max_index(duration_msec: f64, rate: f64) -> Option<usize> {
    sample_count(duration_msec, rate).checked_sub(1)
}
