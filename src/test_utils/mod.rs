mod logging_env;

mod log_capture;
pub(crate) use log_capture::CapturedLogs;

mod mock;
pub(crate) use mock::{MockMediator, MockRegistry, RecordedCall};
