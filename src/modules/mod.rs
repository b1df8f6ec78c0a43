pub mod auth;
pub mod companies;
pub mod workers;
pub mod documents;
pub mod observations;
pub mod credentials;
