pub mod models;
pub mod repository;

#[cfg(test)]
pub mod test_support;

pub use repository::*;
