//! `Accept` header parsing and ranking.

use mime::Mime;

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptRange {
    pub range: Mime,
    pub quality: f32,
}

impl AcceptRange {
    /// 2 for an exact type, 1 for `type/*`, 0 for `*/*`, `None` if unrelated.
    fn specificity(&self, candidate: &Mime) -> Option<u8> {
        if self.range.type_() == mime::STAR {
            return Some(0);
        }
        if self.range.type_() != candidate.type_() {
            return None;
        }
        if self.range.subtype() == mime::STAR {
            return Some(1);
        }
        (self.range.essence_str() == candidate.essence_str()).then_some(2)
    }
}

/// Parse an `Accept` header. Unparsable ranges are skipped.
pub fn parse_accept(header: &str) -> Vec<AcceptRange> {
    header
        .split(',')
        .filter_map(|part| {
            let range: Mime = part.trim().parse().ok()?;
            let quality = range
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .map(|q| q.clamp(0.0, 1.0))
                .unwrap_or(1.0);
            Some(AcceptRange { range, quality })
        })
        .collect()
}

/// Quality the client assigns to `candidate`; the most specific range wins.
pub fn quality(ranges: &[AcceptRange], candidate: &Mime) -> f32 {
    ranges
        .iter()
        .filter_map(|r| r.specificity(candidate).map(|s| (s, r.quality)))
        .max_by_key(|(specificity, _)| *specificity)
        .map(|(_, q)| q)
        .unwrap_or(0.0)
}

/// Index of the preferred candidate, or `None` if nothing is acceptable.
/// Ties go to the earlier candidate.
pub fn best_match(ranges: &[AcceptRange], candidates: &[&str]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let Ok(mime) = candidate.parse::<Mime>() else {
            continue;
        };
        let q = quality(ranges, &mime);
        if q > 0.0 && best.map_or(true, |(_, best_q)| q > best_q) {
            best = Some((index, q));
        }
    }
    best.map(|(index, _)| index)
}
