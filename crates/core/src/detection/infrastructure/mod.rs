pub mod cascade_face_detector;
pub mod correlation_tracker;
pub mod tracking_face_detector;
