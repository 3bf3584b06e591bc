pub mod batch;
pub mod status;
