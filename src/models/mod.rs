pub mod bidmodel;
pub mod chatmodel;
pub mod notificationmodel;
pub mod requestmodel;
pub mod usermodel;
