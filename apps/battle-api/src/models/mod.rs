pub mod battle;
