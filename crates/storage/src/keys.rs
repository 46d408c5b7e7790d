use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

struct KeyClock {
    last_millis: u64,
    sequence: u16,
}

static CLOCK: Mutex<KeyClock> = Mutex::new(KeyClock {
    last_millis: 0,
    sequence: 0,
});

/// Generates a fresh document key. Keys minted by one process sort lexicographically in
/// the order they were generated: 12 hex digits of milliseconds, a 4 hex digit sequence
/// within the millisecond, then 8 hex digits of randomness.
pub fn new_push_key() -> String {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();

    let (millis, sequence) = {
        let mut clock = CLOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if now > clock.last_millis {
            clock.last_millis = now;
            clock.sequence = 0;
        } else if clock.sequence == u16::MAX {
            clock.last_millis += 1;
            clock.sequence = 0;
        } else {
            clock.sequence += 1;
        }
        (clock.last_millis, clock.sequence)
    };

    let entropy = Uuid::new_v4().simple().to_string();
    format!("{millis:012x}{sequence:04x}{}", &entropy[..8])
}
