//! MQTT topic filter matching.

/// Returns true when `topic` matches the subscription `filter`.
///
/// `+` matches exactly one level and `#` (last level only) matches the parent
/// level and everything below it. Topics starting with `$` are not matched by
/// a wildcard in the first level.
///
/// ```
/// use sensor_bridge::source::topic_matches;
///
/// assert!(topic_matches("sensors/+/air", "sensors/device-1/air"));
/// assert!(topic_matches("sensors/#", "sensors/device-1/air"));
/// assert!(!topic_matches("sensors/+", "sensors/device-1/air"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
