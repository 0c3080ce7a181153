pub mod audio;
pub mod bindings;
pub mod config;
pub mod correlate;
pub mod loader;
pub mod session;
pub mod timing;
pub mod track;
pub mod transform;
pub mod ui;
pub mod update_check;

pub use session::Session;
pub use ui::ClavioApp;
