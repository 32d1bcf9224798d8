//! MixRamp curves: per-track start/end volume envelopes used to align
//! cross-fades on equal-loudness points.
//!
//! `interpolate` is a direct, idiomatic transcription of
//! `mixramp_interpolate` in `original_source/src/CrossFade.cxx`: the curve
//! is a list of "dB seconds" pairs with dB values ascending; we look up the
//! number of seconds at which the curve reaches a required dB level.

/// One (dB, seconds) point of a MixRamp curve.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    db: f32,
    secs: f32,
}

/// A parsed MixRamp curve: `"<dB> <seconds>;<dB> <seconds>;..."`, dB
/// strictly ascending, trailing semicolon optional.
#[derive(Debug, Clone, PartialEq)]
pub struct MixRampCurve {
    points: Vec<Point>,
}

impl MixRampCurve {
    pub fn parse(s: &str) -> Option<Self> {
        let mut points = Vec::new();
        for pair in s.trim_end_matches(';').split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let mut parts = pair.split_whitespace();
            let db: f32 = parts.next()?.parse().ok()?;
            let secs: f32 = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            points.push(Point { db, secs });
        }
        if points.is_empty() {
            return None;
        }
        Some(MixRampCurve { points })
    }

    pub fn render(&self) -> String {
        self.points
            .iter()
            .map(|p| format!("{} {}", p.db, p.secs))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Interpolates the curve at the given required dB level.
    ///
    /// - Exact match on a stored point returns its seconds value.
    /// - Below the lowest stored dB: returns the least (lowest-dB) seconds
    ///   value (extrapolate-to-least, per the original).
    /// - Above the highest stored dB with no match found while scanning:
    ///   returns a negative sentinel (malformed / unreachable threshold).
    /// - Otherwise linearly interpolates between the bracketing points.
    pub fn interpolate(&self, required_db: f32) -> f32 {
        let mut last: Option<Point> = None;
        for &p in &self.points {
            if p.db == required_db {
                return p.secs;
            }
            if p.db < required_db {
                last = Some(p);
                continue;
            }
            // p.db > required_db here.
            let Some(last) = last else {
                // required_db is below every point we've seen: least.
                return p.secs;
            };
            return last.secs + (required_db - last.db) * (p.secs - last.secs) / (p.db - last.db);
        }
        -1.0
    }
}

/// Raw MixRamp curve text carried alongside a song, as reported by the
/// decoder (mirrors `DecoderControl::mix_ramp`/`previous_mix_ramp`, which
/// hold the curve as a raw string rather than a parsed value).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MixRampInfo {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl MixRampInfo {
    pub fn start_curve(&self) -> Option<MixRampCurve> {
        self.start.as_deref().and_then(MixRampCurve::parse)
    }

    pub fn end_curve(&self) -> Option<MixRampCurve> {
        self.end.as_deref().and_then(MixRampCurve::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_linearly_between_two_points() {
        let curve = MixRampCurve::parse("-20 0;-10 1").unwrap();
        let a = -20.0;
        let b = -10.0;
        let va = 0.0;
        let vb = 1.0;
        for x in [-20.0, -17.5, -15.0, -12.5, -10.0] {
            let expect = va + (x - a) * (vb - va) / (b - a);
            assert!((curve.interpolate(x) - expect).abs() < 1e-5);
        }
    }

    #[test]
    fn below_range_returns_least() {
        let curve = MixRampCurve::parse("-20 0;-10 1").unwrap();
        assert_eq!(curve.interpolate(-30.0), 0.0);
    }

    #[test]
    fn above_range_returns_negative_sentinel() {
        let curve = MixRampCurve::parse("-20 0;-10 1").unwrap();
        assert!(curve.interpolate(0.0) < 0.0);
    }

    #[test]
    fn render_roundtrips() {
        let curve = MixRampCurve::parse("-10 0;-20 1").unwrap();
        assert_eq!(curve.render(), "-10 0;-20 1");
    }

    #[test]
    fn malformed_is_none() {
        assert!(MixRampCurve::parse("").is_none());
        assert!(MixRampCurve::parse("garbage").is_none());
    }
}
