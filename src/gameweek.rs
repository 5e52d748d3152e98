use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

use crate::error::DataError;

/// Weekly partition rule. Each week is split into two windows (`spans_days`),
/// starting on `anchor_weekday` at `anchor_hour` local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameweekConfig {
    pub anchor_weekday: Weekday,
    pub anchor_hour: u32,
    pub utc_offset_hours: i32,
    pub spans_days: [i64; 2],
    pub origin: u32,
}

impl Default for GameweekConfig {
    fn default() -> Self {
        Self {
            anchor_weekday: Weekday::Fri,
            anchor_hour: 15,
            utc_offset_hours: 0,
            spans_days: [4, 3],
            origin: 1,
        }
    }
}

/// Interval boundaries plus the label shift applied to interval positions.
#[derive(Debug, Clone, PartialEq)]
pub struct GameweekCalendar {
    boundaries: Vec<DateTime<Utc>>,
    offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameweekAssignment {
    pub calendar: GameweekCalendar,
    pub gameweeks: Vec<Option<u32>>,
}

impl GameweekCalendar {
    pub fn boundaries(&self) -> &[DateTime<Utc>] {
        &self.boundaries
    }

    pub fn interval_count(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Gameweek whose interval holds `t`. Timestamps outside the calendar go to
    /// the nearest prior interval, or the first one if none precedes them.
    pub fn gameweek_of(&self, t: DateTime<Utc>) -> u32 {
        label(self.position_of(t), self.offset)
    }

    /// `[lower, upper)` for a gameweek label.
    pub fn interval(&self, gameweek: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let pos = gameweek as i64 - self.offset;
        if pos < 0 {
            return None;
        }
        let pos = pos as usize;
        let lower = *self.boundaries.get(pos)?;
        let upper = *self.boundaries.get(pos + 1)?;
        Some((lower, upper))
    }

    fn position_of(&self, t: DateTime<Utc>) -> usize {
        let intervals = self.interval_count();
        if intervals == 0 {
            return 0;
        }
        let after = self.boundaries.partition_point(|b| *b <= t);
        if after == 0 {
            return 0;
        }
        (after - 1).min(intervals - 1)
    }
}

/// Partition the observed date range and label every timestamp.
///
/// Labels are rebased so the earliest assigned interval carries `reference`
/// when supplied (an upstream minimum gameweek), otherwise `cfg.origin`.
pub fn assign_gameweeks(
    timestamps: &[Option<DateTime<Utc>>],
    reference: Option<u32>,
    cfg: &GameweekConfig,
    source: &str,
) -> Result<GameweekAssignment, DataError> {
    if timestamps.is_empty() {
        return Err(DataError::EmptyDataset {
            file: source.to_string(),
        });
    }
    let mut known = timestamps.iter().flatten();
    let Some(first) = known.next().copied() else {
        return Err(DataError::UnparseableColumn {
            file: source.to_string(),
            column: "Date".to_string(),
        });
    };
    let (earliest, latest) = known.fold((first, first), |(lo, hi), t| (lo.min(*t), hi.max(*t)));

    let boundaries = build_boundaries(earliest, latest, cfg);
    let mut calendar = GameweekCalendar {
        boundaries,
        offset: 0,
    };

    let positions: Vec<Option<usize>> = timestamps
        .iter()
        .map(|t| t.map(|t| calendar.position_of(t)))
        .collect();
    let min_pos = positions.iter().flatten().copied().min().unwrap_or(0);
    let base = reference.unwrap_or(cfg.origin);
    calendar.offset = base as i64 - min_pos as i64;

    let gameweeks = positions
        .into_iter()
        .map(|p| p.map(|p| label(p, calendar.offset)))
        .collect();

    Ok(GameweekAssignment {
        calendar,
        gameweeks,
    })
}

/// Most recent anchor instant (weekday + hour, local offset) at or before `t`.
pub fn first_boundary(t: DateTime<Utc>, cfg: &GameweekConfig) -> DateTime<Utc> {
    let offset = Duration::hours(cfg.utc_offset_hours as i64);
    let local = t.naive_utc() + offset;
    let back = (local.weekday().num_days_from_monday() as i64
        - cfg.anchor_weekday.num_days_from_monday() as i64)
        .rem_euclid(7);
    let anchor_time = NaiveTime::from_hms_opt(cfg.anchor_hour.min(23), 0, 0).unwrap_or_default();
    let mut anchor = (local.date() - Duration::days(back)).and_time(anchor_time);
    if anchor > local {
        anchor -= Duration::days(7);
    }
    (anchor - offset).and_utc()
}

fn build_boundaries(
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    cfg: &GameweekConfig,
) -> Vec<DateTime<Utc>> {
    let mut last = first_boundary(earliest, cfg);
    let mut out = vec![last];
    // The final interval ends at least its own length past `latest`.
    for step in 0.. {
        let span = Duration::days(cfg.spans_days[step % 2].max(1));
        last += span;
        out.push(last);
        if last >= latest + span {
            break;
        }
    }
    out
}

fn label(position: usize, offset: i64) -> u32 {
    u32::try_from(position as i64 + offset).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn anchor_on_exact_boundary_is_itself() {
        let t = Utc.with_ymd_and_hms(2024, 8, 2, 15, 0, 0).unwrap();
        assert_eq!(first_boundary(t, &GameweekConfig::default()), t);
    }

    #[test]
    fn anchor_before_friday_afternoon_goes_back_a_week() {
        let t = Utc.with_ymd_and_hms(2024, 8, 2, 14, 59, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 7, 26, 15, 0, 0).unwrap();
        assert_eq!(first_boundary(t, &GameweekConfig::default()), expected);
    }

    #[test]
    fn anchor_respects_local_offset() {
        let cfg = GameweekConfig {
            utc_offset_hours: 2,
            ..GameweekConfig::default()
        };
        // 13:30 UTC == 15:30 local, so Friday 15:00 local (13:00 UTC) is the anchor.
        let t = Utc.with_ymd_and_hms(2024, 8, 2, 13, 30, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 8, 2, 13, 0, 0).unwrap();
        assert_eq!(first_boundary(t, &cfg), expected);
    }

    #[test]
    fn spans_alternate_four_then_three_days() {
        let cfg = GameweekConfig::default();
        let start = Utc.with_ymd_and_hms(2024, 8, 3, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 8, 20, 12, 0, 0).unwrap();
        let b = build_boundaries(start, end, &cfg);
        let gaps: Vec<i64> = b.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();
        assert_eq!(&gaps[..4], &[4, 3, 4, 3]);
        assert!(*b.last().unwrap() > end);
    }

    #[test]
    fn calendar_runs_a_full_interval_past_latest() {
        let cfg = GameweekConfig::default();
        // Friday 15:00 boundary, then Tuesday 15:00; latest sits just before it.
        let start = Utc.with_ymd_and_hms(2024, 8, 2, 15, 0, 0).unwrap();
        let latest = Utc.with_ymd_and_hms(2024, 8, 6, 14, 0, 0).unwrap();
        let b = build_boundaries(start, latest, &cfg);
        let last = *b.last().unwrap();
        let final_span = last - b[b.len() - 2];
        assert!(last - latest >= final_span);
        assert_eq!(b.len(), 3);

        let single = build_boundaries(start, start, &cfg);
        assert_eq!(single.len(), 2);
    }
}
