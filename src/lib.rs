pub mod api;
pub mod codec;
pub mod config;
pub mod editor;
pub mod entities;
pub mod error;
pub mod external;
pub mod renderer;
pub mod store;
pub mod surface;
pub mod sync;
pub mod viewer;
pub mod viewport;
