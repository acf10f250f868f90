//! Administrative registries: tenants, roles, and storage arrays
//! (`spec.md` §3, §4.4, §4.7).

mod roles;
mod storage;
mod tenants;

pub use roles::RoleRegistry;
pub use storage::StorageRegistry;
pub use tenants::{AdminTokenEnvelope, TenantRegistry, TenantTokenEnvelope, tolerant_admin_token};
