pub mod media;
pub mod meetings;
pub mod store;
pub mod telephony;
pub mod translation;
