mod logging;

pub use logging::LoggingNotifier;
