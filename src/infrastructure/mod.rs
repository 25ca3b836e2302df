pub mod alarm_notifier;
pub mod console_notifier;
pub mod email_notifier;
pub mod event_bus;
pub mod http_page_reader;
pub mod json_store;
pub mod memory_store;
pub mod multi_notifier;
pub mod process_launcher;
pub mod sqlite_store;
pub mod telegram;
pub mod text_chart;
