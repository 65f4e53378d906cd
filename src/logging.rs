use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global logger once. `RUST_LOG` overrides the `info` default.
///
/// With `log_file` set, output is appended to that file instead of stderr.
pub fn init(log_file: Option<&Path>) {
    LOGGER_INIT.get_or_init(|| {
        let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
        builder.format_timestamp_secs();

        if let Some(path) = log_file {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    builder.target(Target::Pipe(Box::new(file)));
                }
                Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
            }
        }

        builder.init();
    });
}
