// handlers/public/mod.rs - Routes outside the collection API

pub mod login;
pub mod ping;
pub mod register;
pub mod user;

pub use login::login_post;
pub use ping::ping_get;
pub use register::register_post;
pub use user::user_post;
