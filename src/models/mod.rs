pub mod alert;
pub mod device;
pub mod payload;
pub mod push_token;
pub mod resident;
pub mod subscription;
pub mod user;
