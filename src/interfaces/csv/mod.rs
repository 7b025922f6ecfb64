pub mod intake_reader;
pub mod summary_writer;
