pub mod alarm_status;
pub mod comparison;

pub use alarm_status::AlarmStatus;
pub use comparison::{ComparisonOperator, UnknownOperator};
