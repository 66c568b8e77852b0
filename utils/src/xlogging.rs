use serde::{Deserialize, Serialize};
use slog::{o, Drain, Logger};

pub use slog;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingSettings {
    pub stdout: bool,
    pub level: String,
    pub log_path: Option<String>,
    pub name: String,
}

pub fn init_log(config: &LoggingSettings) -> Logger {
    let level = match config.level.as_str() {
        "trace" => slog::Level::Trace,
        "debug" => slog::Level::Debug,
        "info" => slog::Level::Info,
        "warning" => slog::Level::Warning,
        "error" => slog::Level::Error,
        "critical" => slog::Level::Critical,
        st => panic!("Unknown logging level {:?}", st),
    };

    let stdout_drain = if config.stdout {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        Some(slog_async::Async::new(drain).build().fuse())
    } else {
        None
    };

    let root = o!("name" => config.name.clone());

    match (stdout_drain, &config.log_path) {
        (Some(stdout), Some(path)) => {
            let file = build_file_drain(path);
            let drain = slog::Duplicate::new(stdout, file).fuse();
            Logger::root(slog::LevelFilter::new(drain, level).fuse(), root)
        }
        (Some(stdout), None) => Logger::root(slog::LevelFilter::new(stdout, level).fuse(), root),
        (None, Some(path)) => {
            let file = build_file_drain(path);
            Logger::root(slog::LevelFilter::new(file, level).fuse(), root)
        }
        (None, None) => Logger::root(slog::Discard, root),
    }
}

fn build_file_drain(log_path: &str) -> slog::Fuse<slog_async::Async> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .unwrap_or_else(|_| panic!("Could not open file {}", log_path));
    let decorator = slog_term::PlainSyncDecorator::new(file);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog_async::Async::new(drain).build().fuse()
}
