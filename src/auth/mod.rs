//! Authentication: JWT issuance, password hashing and role extractors.

pub mod extractor;
pub mod jwt;
pub mod password;
pub mod provider;

pub use extractor::{AdminUser, CurrentUser, CustomerUser};
pub use jwt::{Claims, JwtError, JwtService, Role};
pub use password::{hash_password, verify_password};
pub use provider::{AuthProvider, DbAuthProvider, Principal};
