pub mod bids;
pub mod chat;
pub mod events;
pub mod notifications;
pub mod requests;
