pub mod auth;
pub mod form;
pub mod foto;
pub mod health;
pub mod profile;
pub mod report;
pub mod storage;
pub mod vistoria;
