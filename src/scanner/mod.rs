pub mod crawler;
