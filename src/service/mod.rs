pub mod background_jobs;
pub mod bid_service;
pub mod chat_service;
pub mod error;
pub mod fanout_service;
pub mod realtime;
pub mod request_service;
pub mod unread_service;
