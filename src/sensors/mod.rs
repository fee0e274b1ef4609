//! Sensor module - telemetry link, line parsing and command feedback

mod command;
mod link;
mod parser;
mod simulator;
mod traits;

pub use command::CommandFeedback;
#[cfg(feature = "serial")]
pub use link::SerialLink;
pub use link::{ChannelSource, StdinSource};
pub use parser::{LineParser, Rejection, VoltageUnit};
pub use simulator::{voltage_to_ntu, DemoCommandSink, DemoSource, CLEAR_WATER_MV};
pub use traits::{Command, CommandSink, LineSource, LinkStatus, Sample};
