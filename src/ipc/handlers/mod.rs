pub mod classes;
pub mod core;
pub mod seating;
pub mod setup;
pub mod students;
