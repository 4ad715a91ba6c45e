pub mod attempt_reader;
pub mod fixture_reader;
pub mod receipt_writer;
