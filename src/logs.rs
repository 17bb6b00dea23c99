use log::LevelFilter;
use log4rs::{
    Config,
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

const LOG_SIZE_LIMIT: u64 = 10 * 1024 * 1024; // 10 MB

const LOG_FILE_COUNT: u32 = 3;

const STDERR_LEVEL: LevelFilter = LevelFilter::Info;

const FILE_LEVEL: LevelFilter = LevelFilter::Debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn rolling_file_appender(
    file_path: &str,
    archive_pattern: &str,
) -> Result<RollingFileAppender, BoxError> {
    let trigger = SizeTrigger::new(LOG_SIZE_LIMIT);
    let roller = FixedWindowRoller::builder().build(archive_pattern, LOG_FILE_COUNT)?;
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} {l} {t} - {m}{n}")))
        .build(file_path, Box::new(policy))?;
    Ok(appender)
}

/// Logs to stderr at info level, and to a size-rotated file at debug level
/// when `LOG_FILE_PATH` and `LOG_ARCHIVE_PATTERN` are both set.
pub fn init_logger() {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} - {m}{n}")))
        .build();

    let mut config = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(STDERR_LEVEL)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");

    let file_target = std::env::var("LOG_FILE_PATH")
        .ok()
        .zip(std::env::var("LOG_ARCHIVE_PATTERN").ok());
    if let Some((file_path, archive_pattern)) = file_target {
        match rolling_file_appender(&file_path, &archive_pattern) {
            Ok(logfile) => {
                config = config.appender(
                    Appender::builder()
                        .filter(Box::new(ThresholdFilter::new(FILE_LEVEL)))
                        .build("logfile", Box::new(logfile)),
                );
                root = root.appender("logfile");
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", file_path, e),
        }
    }

    let config = config
        .build(root.build(LevelFilter::Trace))
        .expect("Invalid logger configuration");

    let _handle = log4rs::init_config(config).expect("Failed to initialize logger");
}
