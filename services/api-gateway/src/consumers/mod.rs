pub mod status_changes;
