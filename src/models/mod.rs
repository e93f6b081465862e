// src/models/mod.rs

mod association;
mod mission;
mod user;
mod volunteer;

pub use association::Association;
pub use mission::{Applicant, ApplicantStatus, Mission, MissionStatus};
pub use user::{Role, User};
pub use volunteer::{ApplicationStatus, MissionApplication, Volunteer};
