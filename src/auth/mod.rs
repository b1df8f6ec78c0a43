mod extractor;
mod password;
mod policy;
mod session;
mod token;

pub use password::{hash_password, verify_password};
pub use policy::{authorize, reach, AccessDenied, Action, Actor, Reach, Target, TenantScope};
pub use session::{verify_login, LoginError, Session};
pub use token::{Claims, SignedToken, TokenError, TokenService};
