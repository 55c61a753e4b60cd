pub mod timefmt;
pub mod token;
