mod action;
pub use action::{DeviceActionInstruction, DeviceActionSettings};

mod command;
pub use command::{SendCommandInstruction, SendCommandSettings};
