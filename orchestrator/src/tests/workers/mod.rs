pub mod dispatch;
pub mod driver;
pub mod idle;
pub mod listener;
