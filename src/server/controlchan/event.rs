use super::command::Command;
use crate::server::chancomms::ControlChanMsg;

/// An event for the control loop: either a command from the client or an
/// internal message, typically from a transfer worker.
#[derive(Debug)]
pub enum Event {
    Command(Command),
    InternalMsg(ControlChanMsg),
}
