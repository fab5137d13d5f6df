//! Segment planner
//!
//! Decides where a tall card is cut into image slices. Everything here is a
//! pure function of its inputs: the same policy and geometry always produce
//! the same plan, and no rendering engine is needed to compute one.
//!
//! Three policies are supported:
//!
//! - [`SplitMode::Fixed`] cuts every `target_height` pixels, re-rendering
//!   `overlap` pixels of the previous slice at the top of the next one.
//! - [`SplitMode::HorizontalRule`] cuts exactly at every horizontal rule.
//! - [`SplitMode::Auto`] packs whole blocks (paragraphs, headings, lists...)
//!   into slices of roughly `target_height` pixels.
//!
//! Whatever the mode, a non-empty plan always covers `[0, total_height]`
//! without gaps and its last slice ends exactly at `total_height`.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Pixels added on top of twice the overlap to get the smallest fixed slice.
pub const MIN_SLICE_FLOOR: f64 = 50.0;

/// How slice boundaries are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Fixed pixel height with overlap
    #[default]
    Fixed,
    /// Cut at horizontal-rule markers
    #[serde(rename = "hr", alias = "horizontal-rule")]
    HorizontalRule,
    /// Cut between block elements
    Auto,
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SplitMode::Fixed => "fixed",
            SplitMode::HorizontalRule => "hr",
            SplitMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for SplitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(SplitMode::Fixed),
            "hr" | "horizontal-rule" => Ok(SplitMode::HorizontalRule),
            "auto" => Ok(SplitMode::Auto),
            other => Err(Error::ConfigError(format!("unknown split mode '{}'", other))),
        }
    }
}

/// Vertical extent of one candidate boundary element, relative to the content top
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentGeometry {
    pub top: f64,
    pub height: f64,
}

impl ContentGeometry {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }
}

/// One planned slice: the band `[start_y, start_y + height)` of the content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPosition {
    pub start_y: f64,
    pub height: f64,
}

impl SplitPosition {
    pub fn new(start_y: f64, height: f64) -> Self {
        Self { start_y, height }
    }

    /// Bottom edge of the band (exclusive)
    pub fn end(&self) -> f64 {
        self.start_y + self.height
    }
}

/// Inputs that drive the planner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPolicy {
    pub mode: SplitMode,
    /// Desired slice height in pixels (fixed and auto modes)
    pub target_height: f64,
    /// Pixels shared by consecutive fixed-mode slices
    pub overlap: f64,
    /// Full scrollable height of the content
    pub total_height: f64,
}

/// Plan the slices for `policy`.
///
/// `geometry` is consulted in `HorizontalRule` mode (rule positions) and in
/// `Auto` mode (block positions, ordered by `top`); it is ignored in `Fixed`
/// mode. An empty geometry list, or a mode that yields no slices, falls back
/// to one slice spanning the whole content.
///
/// `policy.total_height` must be positive; use [`plan_checked`] when the
/// inputs come from outside.
pub fn plan_segments(policy: &SplitPolicy, geometry: &[ContentGeometry]) -> Vec<SplitPosition> {
    let total = policy.total_height;
    let positions = match policy.mode {
        SplitMode::Fixed => plan_fixed(policy.target_height, policy.overlap, total),
        SplitMode::HorizontalRule if !geometry.is_empty() => plan_by_rules(geometry, total),
        SplitMode::Auto if !geometry.is_empty() => {
            plan_by_blocks(geometry, policy.target_height, total)
        }
        _ => Vec::new(),
    };

    if positions.is_empty() {
        debug!(
            "{} plan produced no slices; exporting {}px as a single slice",
            policy.mode, total
        );
        return vec![SplitPosition::new(0.0, total)];
    }

    debug!("{} plan: {} slice(s) over {}px", policy.mode, positions.len(), total);
    positions
}

/// Validate the policy and geometry, then plan.
pub fn plan_checked(policy: &SplitPolicy, geometry: &[ContentGeometry]) -> Result<Vec<SplitPosition>> {
    if !policy.total_height.is_finite() || policy.total_height <= 0.0 {
        return Err(Error::PlanningPrecondition(format!(
            "total height must be positive, got {}",
            policy.total_height
        )));
    }
    if policy.mode != SplitMode::HorizontalRule
        && (!policy.target_height.is_finite() || policy.target_height <= 0.0)
    {
        return Err(Error::PlanningPrecondition(format!(
            "target height must be positive, got {}",
            policy.target_height
        )));
    }
    if !policy.overlap.is_finite() || policy.overlap < 0.0 {
        return Err(Error::PlanningPrecondition(format!(
            "overlap must be zero or positive, got {}",
            policy.overlap
        )));
    }
    if let Some(bad) = geometry
        .iter()
        .find(|g| !g.top.is_finite() || !g.height.is_finite() || g.top < 0.0 || g.height < 0.0)
    {
        return Err(Error::PlanningPrecondition(format!(
            "element geometry must be finite and non-negative, got top={} height={}",
            bad.top, bad.height
        )));
    }
    Ok(plan_segments(policy, geometry))
}

/// Check that a caller-supplied plan is usable for capture: non-empty, with
/// finite non-negative starts and positive heights.
pub fn validate_plan(positions: &[SplitPosition]) -> Result<()> {
    if positions.is_empty() {
        return Err(Error::PlanningPrecondition("plan has no slices".into()));
    }
    for (i, p) in positions.iter().enumerate() {
        if !p.start_y.is_finite() || p.start_y < 0.0 || !p.height.is_finite() || p.height <= 0.0 {
            return Err(Error::PlanningPrecondition(format!(
                "slice {} has invalid window start={} height={}",
                i + 1,
                p.start_y,
                p.height
            )));
        }
    }
    Ok(())
}

fn plan_fixed(target_height: f64, overlap: f64, total: f64) -> Vec<SplitPosition> {
    let min_split = 2.0 * overlap + MIN_SLICE_FLOOR;
    let effective = target_height.max(min_split);

    if total <= effective {
        return vec![SplitPosition::new(0.0, total)];
    }

    // effective >= 2 * overlap + 50, so the step is always at least 50px
    let step = effective - overlap;
    let additional = ((total - effective) / step).ceil().max(0.0) as usize;

    let mut positions = Vec::with_capacity(additional + 1);
    positions.push(SplitPosition::new(0.0, effective));

    let mut last_end = effective;
    for i in 1..=additional {
        let mut start_y = last_end - overlap;
        if i < additional {
            positions.push(SplitPosition::new(start_y, effective));
            last_end = start_y + effective;
            continue;
        }
        if total - start_y < min_split {
            // Pull a sliver-sized tail back so it still gets the floor height
            start_y = total - min_split;
        }
        positions.push(span(start_y, total));
    }
    positions
}

/// The band from `start` to `end` with `start_y + height == end` exactly.
///
/// `end - start` alone can round so that adding it back to `start` lands
/// one ulp short of (or past) `end`. The height is nudged first; when `start`
/// sits on a finer grid than `end` no height works, so `start` is moved down
/// onto `end`'s grid, where both the subtraction and the addition are exact.
fn span(start: f64, end: f64) -> SplitPosition {
    let mut height = end - start;
    for _ in 0..8 {
        let reached = start + height;
        if reached == end {
            return SplitPosition::new(start, height);
        }
        height = if reached < end {
            next_up(height)
        } else {
            next_down(height)
        };
    }
    let grid = next_up(end) - end;
    let start = (start / grid).floor() * grid;
    SplitPosition::new(start, end - start)
}

// Neighbouring representable values; only called with positive finite arguments.
fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}

fn next_down(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}

fn plan_by_rules(geometry: &[ContentGeometry], total: f64) -> Vec<SplitPosition> {
    let mut cuts: Vec<f64> = geometry.iter().map(|g| g.top.clamp(0.0, total)).collect();
    cuts.sort_by(f64::total_cmp);

    let mut positions = Vec::with_capacity(cuts.len() + 1);
    let mut last = 0.0;
    for cut in cuts {
        // A rule at the very top, or two rules on the same line, would give an empty slice
        if cut > last {
            positions.push(span(last, cut));
            last = cut;
        }
    }
    if last < total {
        positions.push(span(last, total));
    }
    positions
}

fn plan_by_blocks(geometry: &[ContentGeometry], target_height: f64, total: f64) -> Vec<SplitPosition> {
    let mut positions = Vec::new();
    let mut start = 0.0;
    let mut acc = 0.0;

    // The last block has no successor to look ahead to; it always lands in
    // the trailing slice.
    for (i, pair) in geometry.windows(2).enumerate() {
        let (item, next) = (&pair[0], &pair[1]);
        acc += item.height;
        if i == 0 {
            acc += item.top;
        }

        // Cut early when the gap left to the target is less than half of
        // the next block, rather than slicing through that block.
        let flush = acc >= target_height || target_height - acc < next.height / 2.0;
        if !flush || acc <= 0.0 {
            continue;
        }
        if start + acc >= total {
            break;
        }
        positions.push(SplitPosition::new(start, acc));
        start += acc;
        acc = 0.0;
    }

    if start < total {
        positions.push(span(start, total));
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: SplitMode, target_height: f64, overlap: f64, total_height: f64) -> SplitPolicy {
        SplitPolicy {
            mode,
            target_height,
            overlap,
            total_height,
        }
    }

    fn pairs(positions: &[SplitPosition]) -> Vec<(f64, f64)> {
        positions.iter().map(|p| (p.start_y, p.height)).collect()
    }

    fn assert_covers(positions: &[SplitPosition], total: f64) {
        assert!(!positions.is_empty());
        assert_eq!(positions[0].start_y, 0.0);
        for w in positions.windows(2) {
            assert!(w[1].start_y <= w[0].end(), "gap between {:?} and {:?}", w[0], w[1]);
        }
        assert_eq!(positions.last().unwrap().end(), total);
        assert!(positions.iter().all(|p| p.height > 0.0));
    }

    #[test]
    fn fixed_mode_overlaps_consecutive_slices() {
        let plan = plan_segments(&policy(SplitMode::Fixed, 1200.0, 50.0, 3000.0), &[]);
        assert_eq!(pairs(&plan), vec![(0.0, 1200.0), (1150.0, 1200.0), (2300.0, 700.0)]);
    }

    #[test]
    fn fixed_mode_enforces_minimum_height() {
        let plan = plan_segments(&policy(SplitMode::Fixed, 10.0, 50.0, 500.0), &[]);
        assert_covers(&plan, 500.0);
        assert!(plan.iter().all(|p| p.height == 150.0));
        assert_eq!(plan[1].start_y, 100.0);
        // the 100px tail is pulled back to keep the floor
        assert_eq!(plan.last().unwrap().start_y, 350.0);
    }

    #[test]
    fn fixed_mode_single_slice_when_target_exceeds_total() {
        let plan = plan_segments(&policy(SplitMode::Fixed, 1200.0, 50.0, 500.0), &[]);
        assert_eq!(pairs(&plan), vec![(0.0, 500.0)]);
    }

    #[test]
    fn fixed_mode_tiny_remainder_keeps_positive_last_slice() {
        let plan = plan_segments(&policy(SplitMode::Fixed, 1000.0, 0.0, 1000.5), &[]);
        assert_eq!(pairs(&plan), vec![(0.0, 1000.0), (950.5, 50.0)]);

        let plan = plan_segments(&policy(SplitMode::Fixed, 1000.0, 40.0, 1960.25), &[]);
        assert_covers(&plan, 1960.25);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[2].height, 130.0);
    }

    #[test]
    fn last_slice_ends_exactly_at_total() {
        let total = 8008.206005564482;
        let plan = plan_segments(&policy(SplitMode::Fixed, 72.66, 368.80, total), &[]);
        assert_eq!(plan.last().unwrap().end(), total);

        // fractional totals and cuts, every mode
        for i in 0..2000 {
            let total = 1000.0 + i as f64 * 3.137 + 1.0 / 3.0;
            let rules = [ContentGeometry::new(total / 3.0, 2.0), ContentGeometry::new(total * 0.7, 2.0)];
            let blocks: Vec<ContentGeometry> = (0..20)
                .map(|k| ContentGeometry::new(k as f64 * total / 21.0, total / 21.0))
                .collect();
            for (mode, geometry) in [
                (SplitMode::Fixed, &[][..]),
                (SplitMode::HorizontalRule, &rules[..]),
                (SplitMode::Auto, &blocks[..]),
            ] {
                let plan = plan_segments(&policy(mode, 333.3, 41.7, total), geometry);
                assert_eq!(plan.last().unwrap().end(), total, "{} plan for {}", mode, total);
            }
        }
    }

    #[test]
    fn span_reproduces_its_end() {
        let s = span(7220.60780194301, 8008.206005564482);
        assert_eq!(s.start_y + s.height, 8008.206005564482);
        assert!(s.height > 0.0);

        // start on a finer grid than end, where every height rounds to a tie
        let s = span(4542.275571138932, 16317.441493653589);
        assert_eq!(s.start_y + s.height, 16317.441493653589);
        assert!((s.start_y - 4542.275571138932).abs() < 1e-9);
    }

    #[test]
    fn fixed_mode_exact_multiple_has_no_empty_tail() {
        let plan = plan_segments(&policy(SplitMode::Fixed, 500.0, 0.0, 1500.0), &[]);
        assert_eq!(pairs(&plan), vec![(0.0, 500.0), (500.0, 500.0), (1000.0, 500.0)]);
    }

    #[test]
    fn rules_cut_exactly_at_markers() {
        let rules = [ContentGeometry::new(300.0, 2.0), ContentGeometry::new(700.0, 2.0)];
        let plan = plan_segments(&policy(SplitMode::HorizontalRule, 1200.0, 50.0, 1000.0), &rules);
        assert_eq!(pairs(&plan), vec![(0.0, 300.0), (300.0, 400.0), (700.0, 300.0)]);
    }

    #[test]
    fn rule_at_bottom_adds_no_trailing_slice() {
        let rules = [ContentGeometry::new(400.0, 2.0), ContentGeometry::new(1000.0, 0.0)];
        let plan = plan_segments(&policy(SplitMode::HorizontalRule, 1200.0, 0.0, 1000.0), &rules);
        assert_eq!(pairs(&plan), vec![(0.0, 400.0), (400.0, 600.0)]);
    }

    #[test]
    fn rule_at_top_and_duplicates_are_skipped() {
        let rules = [
            ContentGeometry::new(0.0, 2.0),
            ContentGeometry::new(500.0, 2.0),
            ContentGeometry::new(500.0, 2.0),
        ];
        let plan = plan_segments(&policy(SplitMode::HorizontalRule, 1200.0, 0.0, 800.0), &rules);
        assert_eq!(pairs(&plan), vec![(0.0, 500.0), (500.0, 300.0)]);
    }

    #[test]
    fn empty_geometry_falls_back_to_single_slice() {
        for mode in [SplitMode::HorizontalRule, SplitMode::Auto] {
            let plan = plan_segments(&policy(mode, 100.0, 10.0, 2500.0), &[]);
            assert_eq!(pairs(&plan), vec![(0.0, 2500.0)]);
        }
    }

    #[test]
    fn auto_mode_flushes_when_target_reached() {
        let blocks = [
            ContentGeometry::new(10.0, 100.0),
            ContentGeometry::new(110.0, 100.0),
            ContentGeometry::new(210.0, 100.0),
            ContentGeometry::new(310.0, 100.0),
            ContentGeometry::new(410.0, 90.0),
        ];
        // first block carries its leading 10px: 110, then 210 >= 200
        let plan = plan_segments(&policy(SplitMode::Auto, 200.0, 0.0, 500.0), &blocks);
        assert_eq!(pairs(&plan), vec![(0.0, 210.0), (210.0, 200.0), (410.0, 90.0)]);
    }

    #[test]
    fn auto_mode_flushes_early_before_large_block() {
        let blocks = [
            ContentGeometry::new(0.0, 150.0),
            ContentGeometry::new(150.0, 400.0),
            ContentGeometry::new(550.0, 50.0),
        ];
        // shortfall 50 < 400 / 2, so the big block starts its own slice
        let plan = plan_segments(&policy(SplitMode::Auto, 200.0, 0.0, 600.0), &blocks);
        assert_eq!(pairs(&plan), vec![(0.0, 150.0), (150.0, 400.0), (550.0, 50.0)]);
    }

    #[test]
    fn auto_mode_shortfall_at_exactly_half_does_not_flush() {
        let blocks = [
            ContentGeometry::new(0.0, 100.0),
            ContentGeometry::new(100.0, 200.0),
            ContentGeometry::new(300.0, 100.0),
        ];
        // shortfall 100 == 200 / 2: keep accumulating
        let plan = plan_segments(&policy(SplitMode::Auto, 200.0, 0.0, 400.0), &blocks);
        assert_eq!(pairs(&plan), vec![(0.0, 300.0), (300.0, 100.0)]);
    }

    #[test]
    fn auto_mode_single_block_is_one_slice() {
        let blocks = [ContentGeometry::new(8.0, 5000.0)];
        let plan = plan_segments(&policy(SplitMode::Auto, 200.0, 0.0, 5016.0), &blocks);
        assert_eq!(pairs(&plan), vec![(0.0, 5016.0)]);
    }

    #[test]
    fn auto_mode_never_runs_past_total_height() {
        // geometry taller than the reported content
        let blocks = [
            ContentGeometry::new(0.0, 300.0),
            ContentGeometry::new(300.0, 300.0),
            ContentGeometry::new(600.0, 300.0),
        ];
        let plan = plan_segments(&policy(SplitMode::Auto, 250.0, 0.0, 400.0), &blocks);
        assert_covers(&plan, 400.0);
    }

    #[test]
    fn planning_is_deterministic() {
        let blocks: Vec<_> = (0..40)
            .map(|i| ContentGeometry::new(i as f64 * 37.5, 37.5))
            .collect();
        let p = policy(SplitMode::Auto, 300.0, 0.0, 1500.0);
        assert_eq!(plan_segments(&p, &blocks), plan_segments(&p, &blocks));
    }

    #[test]
    fn plan_checked_rejects_bad_inputs() {
        assert!(matches!(
            plan_checked(&policy(SplitMode::Fixed, 100.0, 0.0, 0.0), &[]),
            Err(Error::PlanningPrecondition(_))
        ));
        assert!(matches!(
            plan_checked(&policy(SplitMode::Fixed, -1.0, 0.0, 100.0), &[]),
            Err(Error::PlanningPrecondition(_))
        ));
        assert!(matches!(
            plan_checked(&policy(SplitMode::Fixed, 100.0, -5.0, 100.0), &[]),
            Err(Error::PlanningPrecondition(_))
        ));
        assert!(matches!(
            plan_checked(
                &policy(SplitMode::HorizontalRule, 100.0, 0.0, 100.0),
                &[ContentGeometry::new(f64::NAN, 1.0)]
            ),
            Err(Error::PlanningPrecondition(_))
        ));
        assert!(plan_checked(&policy(SplitMode::HorizontalRule, 0.0, 0.0, 100.0), &[]).is_ok());
    }

    #[test]
    fn validate_plan_rejects_empty_and_zero_height() {
        assert!(validate_plan(&[]).is_err());
        assert!(validate_plan(&[SplitPosition::new(0.0, 0.0)]).is_err());
        assert!(validate_plan(&[SplitPosition::new(0.0, 10.0)]).is_ok());
    }

    #[test]
    fn split_mode_parses_and_displays() {
        assert_eq!("hr".parse::<SplitMode>().unwrap(), SplitMode::HorizontalRule);
        assert_eq!("AUTO".parse::<SplitMode>().unwrap(), SplitMode::Auto);
        assert!("diagonal".parse::<SplitMode>().is_err());
        assert_eq!(SplitMode::HorizontalRule.to_string(), "hr");
    }
}
