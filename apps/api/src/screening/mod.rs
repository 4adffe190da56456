// Recruiter-side batch screening: orchestration, the session shortlist and
// long-term records of analyzed resumes.

pub mod batch;
pub mod handlers;
pub mod records;
pub mod shortlist;
