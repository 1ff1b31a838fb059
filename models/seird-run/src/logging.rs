use log::LevelFilter;
use log4rs::Config;
use log4rs::Handle;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// ISO 8601 timestamp and color coded level tag
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

/// Installs a console logger at `level`. It writes to stderr because stdout
/// may be carrying the trajectory CSV.
pub fn init(level: LevelFilter) -> anyhow::Result<Handle> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    Ok(log4rs::init_config(config)?)
}
