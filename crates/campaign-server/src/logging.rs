use std::io::Write;
use std::time::{Duration, Instant};

const SLOW_OPERATION: Duration = Duration::from_secs(1);

/// Install the process-wide logger. `RUST_LOG` still takes precedence.
pub fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .init();
}

/// Measures one operation; warns on drop if it ran longer than a second.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    pub fn debug(&self, session_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            session_id,
            self.name,
            self.elapsed_ms()
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.start.elapsed() > SLOW_OPERATION {
            log::warn!("{} took {}ms (slow)", self.name, self.elapsed_ms());
        }
    }
}
