mod catalog;
mod cli;
#[cfg(feature = "test-dbs")]
mod dbs;
mod sql;
mod temporal;
