//! Log level configuration
//!
//! The library logs through the `log` facade. `LogLevel` is the level as it
//! appears in configuration files and on the command line.

use log::LevelFilter;

/// Log levels, from silent to everything
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Nothing = 0,
    Error = 1,
    Warning = 2,
    #[default]
    Info = 3,
    Debug = 4,
    All = 5,
}

impl LogLevel {
    /// Create a LogLevel from an integer
    pub fn from_i32(level: i32) -> Self {
        match level {
            i32::MIN..=0 => LogLevel::Nothing,
            1 => LogLevel::Error,
            2 => LogLevel::Warning,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::All,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Parse a level name or number, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(level) = name.parse::<i32>() {
            return Some(Self::from_i32(level));
        }
        match name.to_ascii_lowercase().as_str() {
            "nothing" | "off" | "none" => Some(LogLevel::Nothing),
            "error" => Some(LogLevel::Error),
            "warning" | "warn" => Some(LogLevel::Warning),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "all" | "trace" => Some(LogLevel::All),
            _ => None,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }
}

/// Set the process-wide maximum log level
pub fn apply_log_level(level: LogLevel) {
    log::set_max_level(level.to_level_filter());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_level_from_i32() {
        assert_eq!(LogLevel::from_i32(0), LogLevel::Nothing);
        assert_eq!(LogLevel::from_i32(1), LogLevel::Error);
        assert_eq!(LogLevel::from_i32(2), LogLevel::Warning);
        assert_eq!(LogLevel::from_i32(3), LogLevel::Info);
        assert_eq!(LogLevel::from_i32(4), LogLevel::Debug);
        assert_eq!(LogLevel::from_i32(5), LogLevel::All);
    }

    #[test]
    fn test_log_level_out_of_range() {
        assert_eq!(LogLevel::from_i32(-1), LogLevel::Nothing);
        assert_eq!(LogLevel::from_i32(100), LogLevel::All);
        assert_eq!(LogLevel::Debug.as_i32(), 4);
    }

    #[test]
    fn test_log_level_from_name() {
        assert_eq!(LogLevel::from_name("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_name(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_name("2"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_name("loud"), None);
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(LogLevel::Nothing.to_level_filter(), LevelFilter::Off);
        assert_eq!(LogLevel::All.to_level_filter(), LevelFilter::Trace);
        assert_eq!(LogLevel::default().to_level_filter(), LevelFilter::Info);
    }

    #[test]
    #[serial]
    fn test_apply_log_level() {
        let previous = log::max_level();
        apply_log_level(LogLevel::Error);
        assert_eq!(log::max_level(), LevelFilter::Error);
        log::set_max_level(previous);
    }
}
