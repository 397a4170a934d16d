pub mod injector;
