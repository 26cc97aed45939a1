pub mod config;

pub mod db;

pub mod ingest;

pub mod logs;

pub mod logger;

#[cfg(test)]
mod test;
