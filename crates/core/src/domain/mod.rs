pub mod team;
