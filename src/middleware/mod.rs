pub mod security;
pub mod timeout;
