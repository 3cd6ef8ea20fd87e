pub mod label_log;
