pub mod foto;
pub mod user;
pub mod vistoria;

pub use foto::*;
pub use user::*;
pub use vistoria::*;
