pub mod auth;
pub mod foto;
pub mod profile;
pub mod vistoria;

pub use auth::AuthService;
pub use foto::FotoService;
pub use profile::ProfileService;
pub use vistoria::VistoriaService;
