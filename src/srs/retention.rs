//! Power-law forgetting curve and target-retention policy.
//!
//! R(t, S) = 1 / (1 + t / (9·S)); t in days, S (stability) in days.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::constants::{
    DEFAULT_TARGET_R, MILLIS_PER_DAY, MIN_STABILITY, TARGET_R_MAX, TARGET_R_MIN,
};

/// Exam-proximity ladder: (minimum days until exam, target R).
const EXAM_TARGET_LADDER: [(i64, f64); 3] = [(31, 0.85), (15, 0.90), (4, 0.93)];
const EXAM_FINAL_STRETCH_TARGET: f64 = 0.96;

pub(crate) fn clamp_stability(stability: f64) -> f64 {
    if stability.is_finite() {
        stability.max(MIN_STABILITY)
    } else {
        MIN_STABILITY
    }
}

pub(crate) fn clamp_target_r(target_r: f64) -> f64 {
    if target_r.is_finite() {
        target_r.clamp(TARGET_R_MIN, TARGET_R_MAX)
    } else {
        DEFAULT_TARGET_R
    }
}

pub(crate) fn elapsed_days(now: DateTime<Utc>, since: DateTime<Utc>) -> f64 {
    let ms = (now - since).num_milliseconds();
    (ms as f64 / MILLIS_PER_DAY as f64).max(0.0)
}

/// Probability of recall at `now`. Clock skew (review in the future) counts
/// as zero elapsed time.
pub fn retrievability(now: DateTime<Utc>, last_review_at: DateTime<Utc>, stability: f64) -> f64 {
    let t = elapsed_days(now, last_review_at);
    let s = clamp_stability(stability);
    1.0 / (1.0 + t / (9.0 * s))
}

/// Days until retrievability decays to `target_r`.
pub fn interval_from_target_r(target_r: f64, stability: f64) -> f64 {
    let r = clamp_target_r(target_r);
    let s = clamp_stability(stability);
    9.0 * s * (1.0 / r - 1.0)
}

/// Parses an exam date given either as an RFC 3339 timestamp or as a plain
/// `YYYY-MM-DD` (interpreted as local midnight).
pub fn parse_exam_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole days until the exam, rounded up.
fn days_until(exam: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (exam - now).num_milliseconds();
    (ms as f64 / MILLIS_PER_DAY as f64).ceil() as i64
}

/// Target retention for the current point in time.
///
/// Without an exam date this is `base_r` (clamped). With one, the ladder
/// fully replaces `base_r`: more than 30 days out 0.85, 15–30 days 0.90,
/// 4–14 days 0.93, otherwise 0.96.
pub fn target_r_for_exam(base_r: f64, exam_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(exam) = exam_date else {
        return clamp_target_r(base_r);
    };
    let days = days_until(exam, now);
    EXAM_TARGET_LADDER
        .iter()
        .find(|(min_days, _)| days >= *min_days)
        .map(|(_, r)| *r)
        .unwrap_or(EXAM_FINAL_STRETCH_TARGET)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn retrievability_is_one_at_zero_elapsed() {
        assert_eq!(retrievability(t0(), t0(), 3.0), 1.0);
        assert_eq!(retrievability(t0(), t0() + Duration::days(2), 3.0), 1.0);
    }

    #[test]
    fn retrievability_at_nine_stability_days_is_half() {
        let r = retrievability(t0() + Duration::days(9), t0(), 1.0);
        assert!((r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn stability_is_floored() {
        let now = t0() + Duration::days(1);
        assert_eq!(retrievability(now, t0(), 0.0), retrievability(now, t0(), 0.1));
        assert_eq!(retrievability(now, t0(), f64::NAN), retrievability(now, t0(), 0.1));
    }

    #[test]
    fn interval_inverts_retrievability() {
        let s = 4.2;
        let days = interval_from_target_r(0.85, s);
        let later = t0() + Duration::milliseconds((days * MILLIS_PER_DAY as f64) as i64);
        let r = retrievability(later, t0(), s);
        assert!((r - 0.85).abs() < 1e-6);
    }

    #[test]
    fn target_r_is_clamped() {
        assert_eq!(interval_from_target_r(1.0, 1.0), interval_from_target_r(0.99, 1.0));
        assert_eq!(interval_from_target_r(0.0, 1.0), interval_from_target_r(0.01, 1.0));
    }

    #[test]
    fn exam_ladder_overrides_base() {
        let now = t0();
        let at = |days: i64| Some(now + Duration::days(days));
        assert_eq!(target_r_for_exam(0.7, None, now), 0.7);
        assert_eq!(target_r_for_exam(1.5, None, now), 0.99);
        assert_eq!(target_r_for_exam(0.7, at(45), now), 0.85);
        assert_eq!(target_r_for_exam(0.7, at(30), now), 0.90);
        assert_eq!(target_r_for_exam(0.7, at(15), now), 0.90);
        assert_eq!(target_r_for_exam(0.7, at(14), now), 0.93);
        assert_eq!(target_r_for_exam(0.7, at(4), now), 0.93);
        assert_eq!(target_r_for_exam(0.85, at(2), now), 0.96);
        assert_eq!(target_r_for_exam(0.85, at(-3), now), 0.96);
    }

    #[test]
    fn exam_date_formats() {
        assert_eq!(parse_exam_date("2024-03-01T00:00:00Z"), Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(parse_exam_date("2024-03-01").is_some());
        assert!(parse_exam_date("not a date").is_none());
        assert!(parse_exam_date("  ").is_none());
    }
}
