pub mod evaluate;
pub mod serve;
