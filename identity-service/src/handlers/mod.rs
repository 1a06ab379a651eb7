pub mod account;
pub mod admin;

pub use account::{change_password, change_password_page, otp_page, otp_submit};
pub use admin::session_summary;
