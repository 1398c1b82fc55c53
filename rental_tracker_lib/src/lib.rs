pub mod comms;
pub mod position;
pub mod report;
pub mod track_session;
pub mod trip;
pub mod user;
