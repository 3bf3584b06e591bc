pub mod batch_repo;

pub use batch_repo::BatchRepo;
