pub mod accounts;
pub mod bootstrap_tokens;
pub mod commands;
pub mod nodes;
pub mod resellers;
pub mod revisions;
pub mod sessions;
pub mod stores;
pub mod tenants;

pub use accounts::CloudAccountRepository;
pub use bootstrap_tokens::BootstrapTokenRepository;
pub use commands::CommandRepository;
pub use nodes::NodeRepository;
pub use resellers::ResellerRepository;
pub use revisions::RevisionRepository;
pub use sessions::SessionRepository;
pub use stores::StoreRepository;
pub use tenants::TenantRepository;
