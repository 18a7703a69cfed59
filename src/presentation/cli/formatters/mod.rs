pub mod preview_fmt;
