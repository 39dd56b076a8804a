pub mod attempt_service;
pub mod certificate_service;
pub mod grading_service;
pub mod notification_service;
pub mod question_selector;
pub mod result_service;
