use crate::track::Note;

/// Fuzzy-match tolerance when no exact counterpart exists.
const MAX_START_DRIFT_US: i64 = 2_500_000;

/// Finds the original-track note a processed note derives from, for the
/// hover hint. Best effort: an unmatched note is a normal outcome, not an
/// error (inserted notes have no counterpart at all).
///
/// Exact match on (start, pitch) wins. Otherwise the nearest same-pitch
/// original by start-time distance wins, if it is within tolerance; ties go
/// to the first candidate in track order.
pub fn correlate<'a>(processed: &Note, originals: &'a [Note]) -> Option<&'a Note> {
    if let Some(exact) = originals
        .iter()
        .find(|o| o.start_us == processed.start_us && o.pitch == processed.pitch)
    {
        return Some(exact);
    }

    let mut best: Option<(&Note, i64)> = None;
    for original in originals.iter().filter(|o| o.pitch == processed.pitch) {
        let drift = (original.start_us - processed.start_us).abs();
        if drift > MAX_START_DRIFT_US {
            continue;
        }
        match best {
            Some((_, best_drift)) if drift >= best_drift => {}
            _ => best = Some((original, drift)),
        }
    }
    best.map(|(note, _)| note)
}
