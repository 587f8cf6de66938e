pub mod context;
pub mod error;
pub mod policy;
pub mod roles;
mod test_macros;

pub use context::{Principal, PrincipalExtractor, ROLES_HEADER, USER_ID_HEADER};
pub use error::{AccessDenied, ACCESS_DENIED_CODE};
pub use policy::{authorize, authorize_all, decide, require_admin, Action, Decision};
pub use roles::{Role, RoleSet};
