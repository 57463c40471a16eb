// src/models/mod.rs
pub mod booking;
pub mod driver;
pub mod order;
pub mod place;
pub mod subscription;
pub mod user;
pub mod webhook;
pub mod zone;

pub use booking::*;
pub use driver::*;
pub use order::*;
pub use place::*;
pub use subscription::*;
pub use user::*;
pub use webhook::*;
pub use zone::*;
