//! Flight simulation step
//!
//! Pure function of a mission plan and elapsed simulated time. The fleet
//! scheduler calls it on every tick and writes the sample back into the
//! drone's flight state.

use drone_core::{COMPLETION_THRESHOLD, EMERGENCY_BATTERY_PERCENT, GeoPoint, LandingReason, MissionParameters};

/// Interpolated flight state at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSample {
    pub position: GeoPoint,
    /// Bearing of the active segment in degrees
    pub heading: f64,
    /// Index of the segment being flown
    pub segment_index: usize,
    /// Progress along the active segment (0.0 - 1.0)
    pub segment_progress: f64,
    /// Route progress percentage (0 - 100)
    pub flight_progress: f64,
    /// Unrounded battery percentage
    pub battery: f64,
    /// Simulated time in milliseconds
    pub elapsed: f64,
}

/// Result of one simulation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub sample: FlightSample,
    /// Set when this step ends the cruise phase
    pub landing: Option<LandingReason>,
}

/// Advance a flight to `elapsed_ms` of simulated time.
///
/// Returns `None` if the plan and path describe no segment to fly.
pub fn advance(
    params: &MissionParameters,
    path: &[GeoPoint],
    launch_battery: f64,
    elapsed_ms: f64,
) -> Option<TickOutcome> {
    let segments = params.segment_times.len().min(path.len().saturating_sub(1));
    if segments == 0 {
        return None;
    }

    let elapsed = elapsed_ms.max(0.0);
    let total = params.total_time;
    let battery = battery_at(params, launch_battery, elapsed);
    let last = segments - 1;

    if elapsed >= total {
        let sample = FlightSample {
            position: path[segments],
            heading: path[last].bearing_to(&path[segments]),
            segment_index: last,
            segment_progress: 1.0,
            flight_progress: 100.0,
            battery,
            elapsed,
        };
        return Some(TickOutcome {
            sample,
            landing: Some(LandingReason::RouteComplete),
        });
    }

    // Find the active segment and how long ago it began
    let mut index = last;
    let mut segment_start = 0.0;
    for (i, end) in params.segment_end_times().take(segments).enumerate() {
        if elapsed < end || i == last {
            index = i;
            break;
        }
        segment_start = end;
    }

    let segment_time = params.segment_times[index];
    let segment_progress = if segment_time > 0.0 {
        ((elapsed - segment_start) / segment_time).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let from = path[index];
    let to = path[index + 1];
    let sample = FlightSample {
        position: from.interpolate(&to, segment_progress),
        heading: from.bearing_to(&to),
        segment_index: index,
        segment_progress,
        flight_progress: ((index as f64 + segment_progress) / segments as f64 * 100.0).min(100.0),
        battery,
        elapsed,
    };

    let landing = if battery <= EMERGENCY_BATTERY_PERCENT {
        Some(LandingReason::BatteryCritical)
    } else if index == last && segment_progress >= COMPLETION_THRESHOLD {
        Some(LandingReason::RouteComplete)
    } else {
        None
    };

    Some(TickOutcome { sample, landing })
}

/// Linear drain from the launch level over the planned flight time
fn battery_at(params: &MissionParameters, launch_battery: f64, elapsed: f64) -> f64 {
    let fraction = if params.total_time > 0.0 {
        (elapsed / params.total_time).min(1.0)
    } else {
        1.0
    };
    (launch_battery - params.battery_consumption * fraction).max(0.0)
}

// ============================================================================
// TESTS
// ============================================================================
