pub mod config;
pub mod xlogging;

pub mod time {
    use std::time::SystemTime;

    /// Milliseconds since the unix epoch.
    pub fn time_now() -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }

    /// Seconds since the unix epoch.
    pub fn unix_now() -> i64 {
        (time_now() / 1000) as i64
    }
}
