//! Logging and diagnostics for the bitplane engine.
//!
//! The stage adapter picks a code path (scalar, portable lanes, SSE2 lanes)
//! at runtime and may copy a remainder tail verbatim. Both decisions are
//! reported through the `log` facade so that a host application can see them.
//! The `log_metric!` macro emits one structured key/value record per call.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::sync::Once;

/// Emits a structured key-value metric record at debug level.
///
/// # Example
/// ```
/// use bitswap::log_metric;
/// let planes = 16;
/// log_metric!("event"="encode", "backend"="sse2", "planes"=&planes);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if log::log_enabled!(log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("BITSWAP_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend once per process.
///
/// With `log_file` set, records are appended to that file instead of stderr.
/// If the file cannot be opened the logger stays on stderr. Later calls are
/// no-ops, as is any call made after another logger was installed.
pub fn enable_verbose_logging(log_file: Option<&str>) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(filename) = log_file {
            match OpenOptions::new().append(true).create(true).open(filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => eprintln!("[WARN] could not open log file {}: {}", filename, e),
            }
        }

        let _ = builder.try_init();
    });
}
