pub mod actions;
pub mod claim;
pub mod entities;
pub mod error;
pub mod health;
pub mod scope;
pub mod secret;
pub mod token;
pub mod validation;

pub use actions::RemoteAction;
pub use entities::{
    AccountStatus, AccountType, BootstrapToken, CloudAccount, Command, CommandLog, CommandStatus,
    Node, Reseller, Revision, Session, Store, StoreStatus, Tenant, REMOTE_ACTION_DOMAIN,
};
pub use error::CoreError;
pub use health::NodeHealth;
pub use scope::Scope;
