pub mod csv_label_log;
