pub mod find;
pub mod inspect;
