pub mod arrange;
pub mod drag;
pub mod gateway;
pub mod layouts;
pub mod seat_id;
pub mod session;
pub mod store;
pub mod student;
