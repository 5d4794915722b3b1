pub mod fake_primer;
pub mod fake_tool;
