// Playback-state arithmetic shared by the session-report handlers.
// Jellyfin positions arrive as ticks (100 ns); we store seconds.

use crate::models::UserData;

pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Items are considered finished at this played percentage.
pub const PLAYED_THRESHOLD: f64 = 98.0;

/// Assumed duration when the media file has no known one.
pub const FALLBACK_DURATION_SECS: f64 = 3600.0;

pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64) as i64
}

/// Fold a playback report into a user-data record. `mark_played` forces
/// the played state (explicit "mark watched"); otherwise crossing
/// [`PLAYED_THRESHOLD`] finishes the item and resets the position.
pub fn apply_progress(
    data: &mut UserData,
    position_ticks: i64,
    duration_secs: Option<f64>,
    mark_played: bool,
    now: String,
) {
    let duration = match duration_secs {
        Some(d) if d > 0.0 => d,
        _ => FALLBACK_DURATION_SECS,
    };
    let position = ticks_to_seconds(position_ticks);
    let percentage = 100.0 * position / duration;

    if mark_played || percentage >= PLAYED_THRESHOLD {
        data.position = 0.0;
        data.played_percentage = 0.0;
        data.played = true;
    } else {
        data.position = position;
        data.played_percentage = percentage;
        data.played = false;
    }
    data.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserData {
        UserData {
            user_id: "u".into(),
            item_id: "i".into(),
            ..Default::default()
        }
    }

    #[test]
    fn progress_updates_position_and_percentage() {
        let mut data = record();
        // 60 seconds into a 3600 second episode.
        apply_progress(&mut data, 600_000_000, Some(3600.0), false, "t1".into());
        assert_eq!(data.position, 60.0);
        assert!((data.played_percentage - 1.6666).abs() < 0.01);
        assert!(!data.played);
    }

    #[test]
    fn crossing_threshold_marks_played_and_resets() {
        let mut data = record();
        // 3564 s of 3600 s = 99%.
        apply_progress(&mut data, 35_640_000_000, Some(3600.0), false, "t1".into());
        assert!(data.played);
        assert_eq!(data.position, 0.0);
        assert_eq!(data.played_percentage, 0.0);
    }

    #[test]
    fn explicit_mark_wins_regardless_of_position() {
        let mut data = record();
        apply_progress(&mut data, 0, Some(3600.0), true, "t1".into());
        assert!(data.played);
        assert_eq!(data.position, 0.0);
    }

    #[test]
    fn unknown_duration_falls_back_to_an_hour() {
        let mut data = record();
        apply_progress(&mut data, 18_000_000_000, None, false, "t1".into());
        // 1800 s of the assumed 3600 s.
        assert_eq!(data.position, 1800.0);
        assert!((data.played_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ticks_round_trip() {
        assert_eq!(seconds_to_ticks(ticks_to_seconds(600_000_000)), 600_000_000);
    }
}
