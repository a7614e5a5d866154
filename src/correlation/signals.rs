//! Signal functions
//!
//! Three pure functions, each mapping an aspect of an (entry, exit)
//! candidate to a score in [0, 100] plus a plain-language explanation.
//! The explanation is part of the contract: it is copied verbatim into
//! the pair's reasoning trail, so these functions never return a score
//! without saying why.

use super::rules::{
    CLOSELY_ALIGNED_SECS, LATENCY_VARIANCE_SECS, NEARLY_IDENTICAL_DIFF_PCT,
    NEARLY_SIMULTANEOUS_SECS, NEUTRAL_PATTERN_SCORE, OVERHEAD_DIFF_PCT,
};

// ============================================================================
// TIME CORRELATION
// ============================================================================

/// Score temporal proximity with exponential decay: 100 at zero delta,
/// 100/e at the window edge, 0 beyond it. Monotonically non-increasing
/// in the delta.
pub fn time_correlation(delta_secs: f64, window_secs: u64) -> (f64, String) {
    let window = window_secs as f64;

    if delta_secs > window {
        let explanation = format!(
            "Observations are {:.1} seconds apart, outside correlation window ({}s). \
             Time correlation score: 0.0%.",
            delta_secs, window_secs
        );
        log::debug!("time signal: {}", explanation);
        return (0.0, explanation);
    }

    let score = 100.0 * (-delta_secs / window).exp();

    let explanation = if delta_secs <= NEARLY_SIMULTANEOUS_SECS {
        format!(
            "Entry and exit observations are nearly simultaneous ({:.2} seconds apart), \
             highly indicative of the same session. Time correlation score: {:.1}%.",
            delta_secs, score
        )
    } else if delta_secs <= CLOSELY_ALIGNED_SECS {
        format!(
            "Observations are closely aligned ({:.1} seconds apart); circuits typically \
             add only a few seconds of latency. Time correlation score: {:.1}%.",
            delta_secs, score
        )
    } else if delta_secs <= LATENCY_VARIANCE_SECS {
        format!(
            "Observations are {:.1} seconds apart, within typical latency variance. \
             Time correlation score: {:.1}%.",
            delta_secs, score
        )
    } else {
        format!(
            "Observations are {:.1} seconds apart; loose correlation within the {}s \
             window, confidence decreases with larger gaps. Time correlation score: {:.1}%.",
            delta_secs, window_secs, score
        )
    };

    log::debug!("time signal: {}", explanation);
    (score, explanation)
}

// ============================================================================
// VOLUME SIMILARITY
// ============================================================================

/// Score byte-volume similarity as min/max of the two volumes. Protocol
/// overhead makes small differences expected; symmetric in its arguments.
pub fn volume_similarity(entry_bytes: u64, exit_bytes: u64) -> (f64, String) {
    if entry_bytes == 0 && exit_bytes == 0 {
        let explanation =
            "Both observations report zero bytes - no volume data to compare. \
             Volume similarity score: 0.0%."
                .to_string();
        log::debug!("volume signal: {}", explanation);
        return (0.0, explanation);
    }

    let max = entry_bytes.max(exit_bytes) as f64;
    let min = entry_bytes.min(exit_bytes) as f64;
    let score = 100.0 * min / max;
    let diff_pct = 100.0 * (max - min) / max;

    let entry_mb = entry_bytes as f64 / 1_000_000.0;
    let exit_mb = exit_bytes as f64 / 1_000_000.0;

    let explanation = if diff_pct <= NEARLY_IDENTICAL_DIFF_PCT {
        format!(
            "Entry traffic: {:.2}MB, exit traffic: {:.2}MB - volumes are nearly identical \
             (difference: {:.1}%). Volume similarity score: {:.1}%.",
            entry_mb, exit_mb, diff_pct, score
        )
    } else if diff_pct <= OVERHEAD_DIFF_PCT {
        format!(
            "Entry traffic: {:.2}MB, exit traffic: {:.2}MB - similar within TOR overhead \
             (difference: {:.1}%). Volume similarity score: {:.1}%.",
            entry_mb, exit_mb, diff_pct, score
        )
    } else if diff_pct < 100.0 {
        format!(
            "Entry traffic: {:.2}MB, exit traffic: {:.2}MB - moderate difference \
             ({:.1}%); may be the same session with buffering variance. \
             Volume similarity score: {:.1}%.",
            entry_mb, exit_mb, diff_pct, score
        )
    } else {
        format!(
            "Entry traffic: {:.2}MB, exit traffic: {:.2}MB - significant volume difference \
             ({:.1}%); unlikely to be the same session. Volume similarity score: {:.1}%.",
            entry_mb, exit_mb, diff_pct, score
        )
    };

    log::debug!("volume signal: {}", explanation);
    (score, explanation)
}

// ============================================================================
// PATTERN SIMILARITY
// ============================================================================

/// Score inter-packet timing similarity from three statistics: packet
/// count ratio, difference of means, difference of standard deviations.
/// Neutral (50) when either side has no timing data; symmetric.
pub fn pattern_similarity(
    entry_timings: Option<&[f64]>,
    exit_timings: Option<&[f64]>,
) -> (f64, String) {
    let (entry, exit) = match (entry_timings, exit_timings) {
        (Some(e), Some(x)) if !e.is_empty() && !x.is_empty() => (e, x),
        _ => {
            let explanation = format!(
                "Inter-packet timing data unavailable for one or both observations - \
                 pattern data unavailable, using neutral score of {:.0}%.",
                NEUTRAL_PATTERN_SCORE
            );
            log::debug!("pattern signal: {}", explanation);
            return (NEUTRAL_PATTERN_SCORE, explanation);
        }
    };

    let count_ratio = entry.len().min(exit.len()) as f64 / entry.len().max(exit.len()) as f64;

    let (entry_mean, entry_std) = mean_and_std(entry);
    let (exit_mean, exit_std) = mean_and_std(exit);

    let mean_score = statistic_similarity(entry_mean, exit_mean);
    let std_score = statistic_similarity(entry_std, exit_std);

    let score = (count_ratio + mean_score + std_score) / 3.0 * 100.0;

    let explanation = format!(
        "Entry pattern: {} packets (mean gap {:.1}ms), exit pattern: {} packets \
         (mean gap {:.1}ms); count ratio {:.2}, mean similarity {:.2}, \
         spread similarity {:.2}. Pattern similarity score: {:.1}%.",
        entry.len(),
        entry_mean,
        exit.len(),
        exit_mean,
        count_ratio,
        mean_score,
        std_score,
        score
    );

    log::debug!("pattern signal: {}", explanation);
    (score, explanation)
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Closeness of two non-negative statistics as 1 - |a-b| / max(a, b),
/// clamped to [0, 1]; equal (including both zero) scores 1.0.
fn statistic_similarity(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max <= 0.0 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / max).clamp(0.0, 1.0)
}

// ============================================================================
// TESTS
// ============================================================================
