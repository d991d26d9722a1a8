use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap())
}

/// Parse `<H>h<M>m<S>s` (any subset, any order constrained to h-then-m-then-s)
/// into total seconds. Returns None when the input matches no component at
/// all (including the empty string) — callers treat that as "unset"/indefinite.
pub fn parse_duration(input: &str) -> Option<u64> {
    let input = input.trim();
    let caps = pattern().captures(input)?;
    let h: u64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    let m: u64 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    let s: u64 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_components() {
        assert_eq!(parse_duration("1h30m15s"), Some(5415));
    }

    #[test]
    fn single_component() {
        assert_eq!(parse_duration("30m"), Some(1800));
        assert_eq!(parse_duration("2h"), Some(7200));
    }

    #[test]
    fn empty_or_garbage_is_unset() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("whenever"), None);
    }
}
