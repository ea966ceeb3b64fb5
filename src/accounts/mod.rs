pub mod error;
pub mod hasher;
pub mod model;
pub mod service;
pub mod store;

pub use self::error::{AccountError, ValidationKind};
pub use self::hasher::{CredentialHasher, HasherParams};
pub use self::model::{Account, AccountId, Credentials, RegisterInput, UpdateInput};
pub use self::service::AccountService;
