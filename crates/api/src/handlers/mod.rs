pub mod upload;
pub mod variations;
