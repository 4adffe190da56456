pub mod recruiter;
pub mod resume;
