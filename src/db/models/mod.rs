mod user;
mod company;
mod worker;
mod document;
mod observation;
mod credential;

pub use user::*;
pub use company::*;
pub use worker::*;
pub use document::*;
pub use observation::*;
pub use credential::*;
