//! Bidirectional snake-pattern path planning between two grid coordinates.
//!
//! Pure, no async, no IO — the same "deliberately pure" shape the kernel
//! uses for its other decision-only modules. Every move this crate emits
//! is a single grid-unit step (`Coordinate::is_adjacent`), and every
//! within-aisle run of a path is monotonic in the rack axis, matching the
//! parity + `Direction` rule below. Cross-aisle transit happens at a
//! constant rack, never touching the rack axis.

use grid::{Coordinate, Direction, GridError, PACKOUT};
use thiserror::Error;

/// A decided, ready-to-execute path segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    pub path: Vec<Coordinate>,
    pub direction: Direction,
    pub duration_s: f64,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// Packout may only appear as the first node (robot's starting
    /// position) or the last node (tour's final destination) of a path,
    /// never as an intermediate waypoint.
    #[error("packout may not appear as a non-terminal waypoint")]
    PackoutMidway,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Timing and cooldown parameters a caller supplies per tick/order; kept
/// as plain fields rather than pulling in the `config` crate so this
/// crate's only dependency stays `grid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavConfig {
    /// Simulated seconds to traverse one full aisle (19 rack-steps).
    pub aisle_traversal_s: f64,
    /// Minimum simulated seconds between two consecutive direction
    /// changes before a new one is honored.
    pub direction_cooldown_s: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            aisle_traversal_s: 7.0,
            direction_cooldown_s: 0.5,
        }
    }
}

/// Carries the robot's current direction label and when it last changed,
/// across however many segments and orders the robot has executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionState {
    pub current: Direction,
    pub changed_at: f64,
}

impl Default for DirectionState {
    /// `changed_at` starts at negative infinity so the very first segment
    /// is never held back by a cooldown that never happened.
    fn default() -> Self {
        Self {
            current: Direction::Forward,
            changed_at: f64::NEG_INFINITY,
        }
    }
}

/// Appends the in-aisle run from `from_rack` to `to_rack` within a fixed
/// `aisle`, not including the run's own starting node.
fn push_rack_run(path: &mut Vec<Coordinate>, aisle: u32, from_rack: u32, to_rack: u32) -> Result<(), GridError> {
    if from_rack == to_rack {
        return Ok(());
    }
    let step: i64 = if to_rack > from_rack { 1 } else { -1 };
    let mut rack = from_rack as i64;
    let target_rack = to_rack as i64;
    while rack != target_rack {
        rack += step;
        path.push(Coordinate::new(aisle, rack as u32)?);
    }
    Ok(())
}

/// Appends the aisle-crossing run from `from_aisle` to `to_aisle` at a
/// fixed `rack`, not including the run's own starting node.
fn push_aisle_run(path: &mut Vec<Coordinate>, from_aisle: u32, to_aisle: u32, rack: u32) -> Result<(), GridError> {
    if from_aisle == to_aisle {
        return Ok(());
    }
    let step: i64 = if to_aisle > from_aisle { 1 } else { -1 };
    let mut aisle = from_aisle as i64;
    let target_aisle = to_aisle as i64;
    while aisle != target_aisle {
        aisle += step;
        path.push(Coordinate::new(aisle as u32, rack)?);
    }
    Ok(())
}

/// Natural direction of an in-aisle run: odd aisle + increasing rack, or
/// even aisle + decreasing rack, is FORWARD; the other pairing is
/// REVERSE. `None` if the run never moves (no rack axis change at all).
fn implied_direction(aisle: u32, from_rack: u32, to_rack: u32) -> Option<Direction> {
    if from_rack == to_rack {
        return None;
    }
    let increasing = to_rack > from_rack;
    let is_odd = aisle % 2 == 1;
    Some(if is_odd == increasing { Direction::Forward } else { Direction::Reverse })
}

fn has_midway_packout(path: &[Coordinate]) -> bool {
    path[1..path.len() - 1].iter().any(Coordinate::is_packout)
}

/// Builds the Manhattan-optimal L-shaped path between `start` and
/// `target`. Two L-shapes are equally minimal: rack-first (settle the
/// rack axis within `start`'s aisle, then cross aisles at `target`'s
/// rack) and aisle-first (cross aisles at `start`'s rack, then settle
/// the rack axis within `target`'s aisle). Rack-first is tried first;
/// if its rack run would pass through packout as a non-terminal
/// waypoint (only possible when `start` is in aisle 1 and `target`'s
/// rack is 1), the aisle-first shape is used instead, since the two
/// shapes can never both clip packout for a non-packout `start`/`target`
/// pair. Returns the path plus the direction implied by its one in-aisle
/// run, or `None` if the segment never moves in the rack axis at all (a
/// pure aisle-to-aisle crossing has no direction to imply).
fn build_path(start: Coordinate, target: Coordinate) -> Result<(Vec<Coordinate>, Option<Direction>), PathError> {
    if start == target {
        return Ok((vec![start], None));
    }

    let mut rack_first = vec![start];
    push_rack_run(&mut rack_first, start.aisle(), start.rack(), target.rack())?;
    push_aisle_run(&mut rack_first, start.aisle(), target.aisle(), target.rack())?;

    if !has_midway_packout(&rack_first) {
        let direction = implied_direction(start.aisle(), start.rack(), target.rack());
        return Ok((rack_first, direction));
    }

    let mut aisle_first = vec![start];
    push_aisle_run(&mut aisle_first, start.aisle(), target.aisle(), start.rack())?;
    push_rack_run(&mut aisle_first, target.aisle(), start.rack(), target.rack())?;

    if has_midway_packout(&aisle_first) {
        return Err(PathError::PackoutMidway);
    }
    let direction = implied_direction(target.aisle(), start.rack(), target.rack());
    Ok((aisle_first, direction))
}

/// Plans one segment, resolving the reported `Direction` against the
/// cooldown and updating `state` in place when a change is actually
/// honored.
///
/// The two directions never differ in path length here — both aisles
/// flanking any crossing admit at least one direction whose legal rack
/// order matches the move needed, so there is no "shorter candidate" to
/// pick between. What cooldown actually governs is whether a direction
/// change implied by this segment's shape is reported at all: within the
/// cooldown window the previous direction is retained even though the
/// shape's own implied direction differs, exactly as it would be if the
/// two candidates tied and the tie-break favored the incumbent.
pub fn plan_segment(
    start: Coordinate,
    target: Coordinate,
    cfg: &NavConfig,
    state: &mut DirectionState,
    now: f64,
) -> Result<PlannedSegment, PathError> {
    let (path, implied) = build_path(start, target)?;

    let reported = match implied {
        None => state.current,
        Some(dir) if dir == state.current => dir,
        Some(dir) => {
            if now - state.changed_at < cfg.direction_cooldown_s {
                state.current
            } else {
                state.current = dir;
                state.changed_at = now;
                dir
            }
        }
    };

    let per_step_s = cfg.aisle_traversal_s / (grid::MAX_RACK - grid::MIN_RACK) as f64;
    let duration_s = (path.len() - 1) as f64 * per_step_s;

    Ok(PlannedSegment {
        path,
        direction: reported,
        duration_s,
    })
}

/// The ordered waypoints of a tour: each item in assignment order,
/// followed by packout. Plain bookkeeping, no planning — callers feed
/// these one at a time into [`plan_segment`] as the robot reaches each.
pub fn tour_waypoints(items: &[Coordinate]) -> Vec<Coordinate> {
    let mut waypoints = Vec::with_capacity(items.len() + 1);
    waypoints.extend_from_slice(items);
    waypoints.push(PACKOUT);
    waypoints
}

/// Plans an entire tour at a single instant, advancing a local clock by
/// each leg's travel duration. A convenience for tests and any caller
/// that wants total tour distance/time up front; the robot controller
/// itself plans leg by leg against the real tick clock, since a pick
/// also takes simulated time between legs.
pub fn plan_tour_now(
    start: Coordinate,
    items: &[Coordinate],
    cfg: &NavConfig,
    state: &mut DirectionState,
    now: f64,
) -> Result<Vec<PlannedSegment>, PathError> {
    let waypoints = tour_waypoints(items);
    let mut legs = Vec::with_capacity(waypoints.len());
    let mut from = start;
    let mut t = now;
    for target in waypoints {
        let segment = plan_segment(from, target, cfg, state, t)?;
        t += segment.duration_s;
        from = target;
        legs.push(segment);
    }
    Ok(legs)
}

/// Total Manhattan grid-units walked across a planned tour.
pub fn total_distance(legs: &[PlannedSegment]) -> u32 {
    legs.iter()
        .map(|s| (s.path.len() - 1) as u32)
        .sum()
}
