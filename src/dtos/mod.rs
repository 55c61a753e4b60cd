pub mod biddtos;
pub mod chatdtos;
pub mod notificationdtos;
pub mod requestdtos;
