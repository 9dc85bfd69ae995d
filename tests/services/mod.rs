mod channel_tests;
mod document_tests;
mod event_tests;
mod forum_tests;
mod message_tests;
mod profile_tests;
mod realtime_tests;
