pub mod backup;
pub mod inspect;
pub mod list;
pub mod purge_expired;
pub mod restore;
