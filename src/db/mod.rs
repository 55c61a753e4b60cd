pub mod biddb;
pub mod cache;
pub mod chatdb;
pub mod db;
pub mod notificationdb;
pub mod requestdb;
pub mod userdb;

pub use db::DBClient;
