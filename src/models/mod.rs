pub mod certificate;
pub mod exam;
pub mod exam_attempt;
pub mod question;
pub mod question_response;
