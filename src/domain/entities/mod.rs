pub mod alarm;
pub mod enclosure;
pub mod recipient;
pub mod sample;
pub mod threshold_rule;

pub use alarm::{Alarm, NewAlarm};
pub use enclosure::Enclosure;
pub use recipient::Recipient;
pub use sample::{NewSample, Sample};
pub use threshold_rule::ThresholdRule;
