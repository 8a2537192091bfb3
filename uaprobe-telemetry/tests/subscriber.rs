//! Global subscriber installation. Kept in its own test binary so no other
//! test has installed a global subscriber first.

use uaprobe_telemetry::EventLogger;

#[test]
fn second_init_fails_without_panicking() {
    EventLogger::init("debug").unwrap();
    assert!(tracing::enabled!(tracing::Level::WARN));
    assert!(EventLogger::init("info").is_err());
}
