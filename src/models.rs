pub mod account;
pub mod item;
pub mod referral;
pub mod types;
