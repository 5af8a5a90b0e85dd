// handlers/mod.rs - Route handlers
//
// public:   liveness, user creation, register/login  (/, /user, /api/v1/*)
// resource: generic collection CRUD                  (/api/v1/:collection[/:id])

pub mod execute;
pub mod public;
pub mod resource;

pub use execute::execute;
